//! Prompt assembly.
//!
//! All prompts are Vietnamese. Retrieved provisions go into the system
//! message on the legal path; the chat path carries no passages. History is
//! passed as structured turns, bounded by a token budget.

use crate::capabilities::GenerationRequest;
use crate::tokens::clip_chars;
use crate::types::{Chunk, ConversationTurn};

/// First token of a legal answer that found no grounding.
pub const NO_GROUNDING_DISCLAIMER: &str = "Lưu ý: Không tìm thấy điều khoản pháp luật phù hợp trong cơ sở dữ liệu. Câu trả lời dưới đây chỉ mang tính tham khảo, không phải tư vấn pháp lý.\n\n";

/// Replaces an empty successful generation.
pub const EMPTY_ANSWER_FALLBACK: &str = "Xin lỗi, tôi không thể tạo câu trả lời.";

/// Placeholder for an empty history.
pub const NO_HISTORY: &str = "(Chưa có)";

const LEGAL_SYSTEM: &str = "Bạn là trợ lý chuyên về pháp luật lao động Việt Nam.

Nguyên tắc trả lời:
1. Chỉ sử dụng các điều khoản được cung cấp bên dưới.
2. Nêu rõ tên văn bản, số Điều và Khoản khi trích dẫn.
3. Trả lời bằng tiếng Việt, ngắn gọn và dễ hiểu.
4. Nếu các điều khoản không đủ để trả lời, nói rõ: \"Câu hỏi của bạn không nằm trong phạm vi của tôi.\"

Khi câu hỏi liên quan đến trợ cấp:
- Trợ cấp thôi việc (Điều 46 BLLĐ 2019): mỗi năm làm việc được nửa tháng tiền lương.
- Trợ cấp mất việc làm (Điều 47 BLLĐ 2019): mỗi năm làm việc được một tháng tiền lương, ít nhất hai tháng; áp dụng khi sáp nhập, tái cơ cấu.
- Thời gian tính trợ cấp là tổng thời gian làm việc trừ thời gian đã đóng BHTN.
- Số tháng lẻ dưới 6 tháng tính nửa năm, từ 6 tháng trở lên tính một năm.

Các điều khoản liên quan:
";

const CHAT_SYSTEM: &str = "Bạn là trợ lý thân thiện về pháp luật lao động Việt Nam. Hãy trả lời lời chào hỏi và câu hỏi chung một cách ngắn gọn.

Nếu người dùng hỏi bạn làm được gì, giới thiệu rằng bạn trả lời các câu hỏi về Bộ luật Lao động, bảo hiểm xã hội, hợp đồng lao động, tiền lương, trợ cấp và các chế độ liên quan.";

const DEGRADED_SYSTEM: &str = "Bạn là trợ lý về pháp luật lao động Việt Nam. Không tìm thấy điều khoản nào phù hợp với câu hỏi này. Hãy trả lời thận trọng dựa trên hiểu biết chung, không trích dẫn số Điều cụ thể, và khuyên người dùng kiểm tra văn bản gốc hoặc hỏi cơ quan lao động địa phương.";

const ROUTER_SYSTEM: &str = "Bạn là bộ phân loại ý định cho trợ lý pháp luật lao động. Phân loại câu hỏi vào một trong hai loại:
- LEGAL: câu hỏi về pháp luật lao động, bảo hiểm, hợp đồng, tiền lương, trợ cấp, kỷ luật.
- CHAT: chào hỏi, cảm ơn, hỏi về trợ lý, hoặc nội dung không liên quan đến pháp luật.

Nếu lịch sử đang bàn về pháp luật và câu hỏi hiện tại là câu hỏi nối tiếp, chọn LEGAL.

Trả lời đúng ba dòng:
INTENT: LEGAL hoặc CHAT
CONFIDENCE: số từ 0.0 đến 1.0
REASONING: giải thích ngắn";

const CONDENSE_SYSTEM: &str = "Viết lại câu hỏi nối tiếp thành một câu hỏi độc lập, dựa vào lịch sử hội thoại.

Quy tắc:
1. Giữ nguyên các từ khóa pháp lý: sáp nhập, tái cơ cấu, mang thai, thai sản, nghỉ hưu, sa thải, độc hại, BHTN, BHXH, trợ cấp, hợp đồng.
2. Giữ nguyên mọi con số: số năm làm việc, tiền lương, tuổi, thời gian đóng bảo hiểm.
3. Giữ nguyên lý do nghỉ việc nếu có.
4. Thay đại từ và cách nói tắt bằng thuật ngữ cụ thể từ lịch sử.
5. Không thay đổi ý nghĩa. Chỉ trả về câu hỏi đã viết lại, không giải thích.";

/// Render turns as `Người dùng: ...` / `Trợ lý: ...` lines, each clipped.
pub fn format_history(turns: &[ConversationTurn], max_turn_chars: usize) -> String {
    if turns.is_empty() {
        return NO_HISTORY.to_string();
    }
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.label(), clip_chars(&t.text, max_turn_chars)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Most recent turns whose summed token counts fit `max_tokens`, oldest first.
///
/// Stops at the first turn that does not fit so the window stays contiguous.
pub fn history_within_budget(turns: &[ConversationTurn], max_tokens: usize) -> Vec<ConversationTurn> {
    let mut used = 0;
    let mut start = turns.len();
    for (i, turn) in turns.iter().enumerate().rev() {
        if used + turn.tokens > max_tokens {
            break;
        }
        used += turn.tokens;
        start = i;
    }
    turns[start..].to_vec()
}

/// Numbered provision blocks for the legal system prompt.
pub fn format_passages(chunks: &[&Chunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] {}\n{}", i + 1, chunk.provision.label(), chunk.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Legal path: provisions in the system message, bounded history, user question.
pub fn legal_request(
    utterance: &str,
    passages: &[&Chunk],
    history: Vec<ConversationTurn>,
) -> GenerationRequest {
    GenerationRequest {
        system: format!("{}{}", LEGAL_SYSTEM, format_passages(passages)),
        history,
        prompt: utterance.to_string(),
    }
}

/// Chat path: no passages.
pub fn chat_request(utterance: &str, history: Vec<ConversationTurn>) -> GenerationRequest {
    GenerationRequest {
        system: CHAT_SYSTEM.to_string(),
        history,
        prompt: utterance.to_string(),
    }
}

/// Legal question with no usable retrieval results.
pub fn degraded_request(utterance: &str, history: Vec<ConversationTurn>) -> GenerationRequest {
    GenerationRequest {
        system: DEGRADED_SYSTEM.to_string(),
        history,
        prompt: utterance.to_string(),
    }
}

/// Classification prompt for the `llm` router.
pub fn router_request(utterance: &str, history_text: &str) -> GenerationRequest {
    GenerationRequest::single(
        ROUTER_SYSTEM,
        format!("Lịch sử:\n{}\n\nCâu hỏi: {}", history_text, utterance),
    )
}

/// Condense prompt for the `llm` rewriter.
pub fn condense_request(utterance: &str, history_text: &str) -> GenerationRequest {
    GenerationRequest::single(
        CONDENSE_SYSTEM,
        format!(
            "Lịch sử:\n{}\n\nCâu hỏi tiếp theo: {}\n\nCâu hỏi độc lập:",
            history_text, utterance
        ),
    )
}

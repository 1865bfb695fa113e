use serde_json::Value;

/// Marker the model uses when the context does not cover the question.
pub const NOT_IN_CONTEXT: &str = "Không tìm thấy trong dữ liệu luật hiện có.";

const ANSWER_SYSTEM_PROMPT: &str = "Bạn là trợ lý pháp lý trả lời câu hỏi về pháp luật Việt Nam. \
Chỉ sử dụng các đoạn văn bản trong phần CONTEXT, không dùng kiến thức bên ngoài. \
Mỗi ý trả lời phải dẫn nguồn theo dạng \"Tên luật – Điều X, Khoản Y\" đúng như tiêu đề của đoạn được dùng. \
Nếu CONTEXT chỉ trả lời được một phần câu hỏi, hãy trả lời phần đó và nói rõ phần còn thiếu. \
Nếu CONTEXT không liên quan đến câu hỏi, chỉ trả lời đúng một câu: \"Không tìm thấy trong dữ liệu luật hiện có.\"";

pub fn build_answer_messages(context: &str, question: &str) -> Vec<Value> {
	let user_prompt = format!("CONTEXT:\n{context}\n\nCÂU HỎI: {}", question.trim());

	vec![
		serde_json::json!({ "role": "system", "content": ANSWER_SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

pub fn build_keyword_messages(question: &str) -> Vec<Value> {
	let system_prompt = "Bạn hỗ trợ tra cứu văn bản pháp luật Việt Nam. \
Với câu hỏi được cung cấp, hãy liệt kê các từ khóa và thuật ngữ pháp lý đồng nghĩa giúp tìm đúng điều luật. \
Chỉ trả về một dòng gồm các từ khóa cách nhau bởi dấu phẩy, không giải thích.";
	let user_prompt = format!("Câu hỏi:\n{}", question.trim());

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

pub fn build_paraphrase_messages(question: &str, max_paraphrases: u32) -> Vec<Value> {
	let schema = serde_json::json!({ "queries": ["string"] });
	let schema_text = serde_json::to_string_pretty(&schema)
		.unwrap_or_else(|_| "{\"queries\": [\"string\"]}".to_string());
	let system_prompt = "Bạn là bộ mở rộng truy vấn cho hệ thống tra cứu văn bản pháp luật Việt Nam. \
Đầu ra phải là JSON hợp lệ và đúng chính xác schema được cung cấp. \
Viết lại câu hỏi thành các câu hỏi tiếng Việt khác nhau nhưng giữ nguyên ý định pháp lý. \
Không thêm giải thích hoặc trường dữ liệu khác.";
	let user_prompt = format!(
		"Trả về JSON theo đúng schema sau:\n{schema_text}\nRàng buộc:\n- MAX_QUERIES = {max_paraphrases}\nCâu hỏi gốc:\n{}",
		question.trim()
	);

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

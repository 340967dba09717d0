//! Prompt template preview
//!
//! Renders the final prompt a persona would produce, with placeholders in
//! place of the user query and retrieved documents.

const GENERAL_SEP: &str = "--------------";
const QUERY_PLACEHOLDER: &str = "<USER_QUERY>";
const CONTEXT_PLACEHOLDER: &str = "<CONTEXT_DOCS>";

/// Compose the preview template for a system/task prompt pair
pub fn build_dummy_prompt(
    system_prompt: &str,
    task_prompt: &str,
    retrieval_disabled: bool,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    let system_prompt = system_prompt.trim();
    if !system_prompt.is_empty() {
        sections.push(system_prompt.to_string());
    }

    if !retrieval_disabled {
        sections.push(format!(
            "CONTEXT:\n{sep}\n{docs}\n{sep}",
            sep = GENERAL_SEP,
            docs = CONTEXT_PLACEHOLDER
        ));
    }

    let task_prompt = task_prompt.trim();
    if !task_prompt.is_empty() {
        sections.push(task_prompt.to_string());
    }

    sections.push(format!("QUERY: {}\nRESPONSE:", QUERY_PLACEHOLDER));

    sections.join("\n\n")
}

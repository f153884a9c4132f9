//! Prompt assembly for generation runs.
//!
//! Resolved sources are rendered into tagged `<Source>` blocks and wrapped in
//! one of two fixed system-prompt templates: a source-context preamble for
//! text generation, or a keyword-extraction template for web search. The
//! text-generation system prompt is omitted entirely when there are no
//! sources; the web-search one is always present.

use crate::source::ResolvedSource;

/// Preamble prepended to source blocks for text-generation runs.
pub const SOURCE_CONTEXT_PREAMBLE: &str = "Your primary objective is to fulfill the user's request by utilizing the information provided within the <Source> tags. Analyze the structured content carefully and leverage it to generate accurate and relevant responses. Focus on addressing the user's needs effectively while maintaining coherence and context throughout the interaction.";

/// Keyword-extraction template used for every web-search run.
pub const WEB_SEARCH_KEYWORD_TEMPLATE: &str = r#"You are an AI assistant specialized in generating effective keywords for Google Search based on user requests. Your task is to analyze the user's input and produce a concise, relevant keyword or short phrase that will yield the most useful search results.

Follow these guidelines:
1. Identify the core topic or intent of the user's request.
2. Extract the most important words or concepts.
3. Consider synonyms or related terms that might be more commonly used.
4. Aim for specificity while avoiding overly niche terms.
5. Keep the keyword or phrase concise, typically 1-3 words.
6. Avoid branded terms unless specifically mentioned by the user.
7. Use common spelling and avoid abbreviations unless they are widely recognized.
8. You must suggest keywords at least 3 times.
9. If provided, incorporate relevant reference information to refine the keyword.

Examples:
User request: "I need information about the health benefits of eating apples."
Keyword: "apple health benefits"

User request: "What are some good restaurants in New York City for Italian cuisine?"
Keyword: "best NYC Italian restaurants"

User request: "How do I fix a leaky faucet in my bathroom sink?"
Keyword: "fix leaky faucet"

User request: "Tell me about the impact of climate change on polar bears."
Reference info: Recent studies show declining sea ice affects hunting patterns.
Keyword: "polar bear sea ice impact"

Now, generate an appropriate keyword or short phrase for Google Search based on the user's request and any provided reference information."#;

/// Render one resolved source as a tagged block.
#[must_use]
pub fn render_source_block(source: &ResolvedSource) -> String {
    format!(
        "<Source title=\"{}\" type=\"{}\" id=\"{}\">{}</Source>",
        source.title, source.kind, source.id, source.content
    )
}

fn render_source_blocks(sources: &[ResolvedSource]) -> String {
    sources
        .iter()
        .map(render_source_block)
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt for a text-generation run, or `None` with no sources.
#[must_use]
pub fn assemble_system_prompt(sources: &[ResolvedSource]) -> Option<String> {
    if sources.is_empty() {
        return None;
    }
    Some(format!(
        "{SOURCE_CONTEXT_PREAMBLE}\n\n{}",
        render_source_blocks(sources)
    ))
}

/// System prompt for a web-search run; always present, with the source
/// blocks appended between delimiter lines even when empty.
#[must_use]
pub fn web_search_system_prompt(sources: &[ResolvedSource]) -> String {
    format!(
        "{WEB_SEARCH_KEYWORD_TEMPLATE}\n\n--\n{}\n--",
        render_source_blocks(sources)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ResolvedSourceKind;

    fn doc_source() -> ResolvedSource {
        ResolvedSource {
            id: "src_1".to_string(),
            title: "doc".to_string(),
            content: "abc".to_string(),
            kind: ResolvedSourceKind::TextContent,
        }
    }

    #[test]
    fn no_sources_omits_system_prompt() {
        assert_eq!(assemble_system_prompt(&[]), None);
    }

    #[test]
    fn source_block_carries_title_type_and_id() {
        let prompt = assemble_system_prompt(&[doc_source()]).unwrap();
        assert!(prompt.contains(r#"<Source title="doc" type="textContent" id="src_1">abc</Source>"#));
        assert!(prompt.starts_with(SOURCE_CONTEXT_PREAMBLE));
    }

    #[test]
    fn web_search_prompt_is_always_present() {
        let prompt = web_search_system_prompt(&[]);
        assert!(prompt.starts_with(WEB_SEARCH_KEYWORD_TEMPLATE));

        let with_source = web_search_system_prompt(&[doc_source()]);
        assert!(with_source.contains(r#"type="textContent""#));
    }

    #[test]
    fn artifact_kind_renders_as_artifact() {
        let source = ResolvedSource {
            id: "artf_1".to_string(),
            title: "Pizza".to_string(),
            content: "best pizza in town".to_string(),
            kind: ResolvedSourceKind::Artifact,
        };
        assert!(render_source_block(&source).contains(r#"type="artifact""#));
    }
}

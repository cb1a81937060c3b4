//! Prompt builder: role instruction + enumerated excerpts + the question.
//!
//! Excerpts keep their retrieval order. When a character budget is set, the
//! lowest-ranked excerpts are dropped first; the top excerpt is cut at a char
//! boundary only if it alone exceeds the budget.

use std::str::FromStr;

use rag_store::RagHit;

use crate::error::ContextorError;

/// Emitted in place of the context block when nothing was retrieved.
pub const NO_CONTEXT: &str = "No specific context available.";

/// Answer given when the prompt preparation or generation fails.
pub const APOLOGY: &str = "Sorry, I encountered an error processing your request.";

pub const DEFAULT_PERSONA: &str =
    "You are a constitutional law expert analyzing Kazakhstan's Constitution.";

pub const DEFAULT_RULES: &[&str] = &[
    "Answer in clear English",
    "Cite relevant articles and source documents when possible",
    "Be precise with legal terminology",
    "If the excerpts do not address the question, say \"The Constitution doesn't explicitly state this\"",
];

const CONTEXT_HEADER: &str = "Context from Constitution:";
const EXCERPT_SEPARATOR: &str = "\n\n---\n\n";

/// Prompt layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PromptFormat {
    /// `[INST] <<SYS>> ... <</SYS>> ... [/INST]`, for Mistral/Llama instruct models.
    #[default]
    Instruct,
    /// Labeled sections without model-specific markers.
    Plain,
}

impl FromStr for PromptFormat {
    type Err = ContextorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instruct" | "inst" => Ok(Self::Instruct),
            "plain" => Ok(Self::Plain),
            other => Err(ContextorError::Config(format!("unknown prompt format `{other}`"))),
        }
    }
}

/// Role instruction and layout for [`assemble`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptPolicy {
    pub persona: String,
    pub rules: Vec<String>,
    pub format: PromptFormat,
    /// Total excerpt characters allowed; `None` means unlimited.
    pub max_context_chars: Option<usize>,
}

impl Default for PromptPolicy {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            rules: DEFAULT_RULES.iter().map(|r| r.to_string()).collect(),
            format: PromptFormat::Instruct,
            max_context_chars: None,
        }
    }
}

/// One excerpt to show the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Passage {
    pub text: String,
    pub source: Option<String>,
}

impl Passage {
    pub fn new(text: impl Into<String>, source: Option<String>) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

impl From<&RagHit> for Passage {
    fn from(hit: &RagHit) -> Self {
        Self::new(hit.text.clone(), hit.source().map(str::to_string))
    }
}

/// Builds the prompt from bare excerpt texts.
///
/// # Example
/// ```
/// use contextor::prompt::{assemble, PromptPolicy, NO_CONTEXT};
///
/// let p = assemble::<&str>("Who is the head of state?", &[], &PromptPolicy::default());
/// assert!(p.contains(NO_CONTEXT));
/// ```
pub fn assemble<S: AsRef<str>>(question: &str, chunks: &[S], policy: &PromptPolicy) -> String {
    let passages: Vec<Passage> = chunks
        .iter()
        .map(|c| Passage::new(c.as_ref(), None))
        .collect();
    assemble_passages(question, &passages, policy)
}

/// Builds the prompt from excerpts that may carry a source label.
pub fn assemble_passages(question: &str, passages: &[Passage], policy: &PromptPolicy) -> String {
    let used = budget(passages, policy.max_context_chars);
    let context = render_context(&used);
    let question = question.trim();

    let mut out = String::new();
    match policy.format {
        PromptFormat::Instruct => {
            out.push_str("[INST] <<SYS>>\n");
            push_role(&mut out, policy);
            out.push_str("<</SYS>>\n\n");
            out.push_str(&context);
            out.push_str("\n\nQuestion: ");
            out.push_str(question);
            out.push_str("\n\nAnswer: [/INST]");
        }
        PromptFormat::Plain => {
            out.push_str("System:\n");
            push_role(&mut out, policy);
            out.push('\n');
            out.push_str(&context);
            out.push_str("\n\nQuestion:\n");
            out.push_str(question);
            out.push_str("\n\nAnswer:");
        }
    }
    out
}

/// Keeps the longest ranked prefix of `passages` whose total char count fits
/// `max_chars`. Idempotent.
pub fn budget(passages: &[Passage], max_chars: Option<usize>) -> Vec<Passage> {
    let Some(max) = max_chars else {
        return passages.to_vec();
    };

    let mut used = Vec::new();
    let mut spent = 0usize;
    for (i, p) in passages.iter().enumerate() {
        let len = p.text.chars().count();
        if spent + len <= max {
            spent += len;
            used.push(p.clone());
            continue;
        }
        if i == 0 && max > 0 {
            let text: String = p.text.chars().take(max).collect();
            used.push(Passage::new(text, p.source.clone()));
        }
        break;
    }
    used
}

fn push_role(out: &mut String, policy: &PromptPolicy) {
    out.push_str(policy.persona.trim());
    out.push('\n');
    if !policy.rules.is_empty() {
        out.push_str("Always:\n");
        for rule in &policy.rules {
            out.push_str("- ");
            out.push_str(rule);
            out.push('\n');
        }
    }
}

fn render_context(passages: &[Passage]) -> String {
    if passages.is_empty() {
        return NO_CONTEXT.to_string();
    }
    let excerpts: Vec<String> = passages
        .iter()
        .enumerate()
        .map(|(i, p)| match &p.source {
            Some(src) => format!("Excerpt {} (source: {src}):\n{}", i + 1, p.text.trim()),
            None => format!("Excerpt {}:\n{}", i + 1, p.text.trim()),
        })
        .collect();
    format!("{CONTEXT_HEADER}\n{}", excerpts.join(EXCERPT_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passages(texts: &[&str]) -> Vec<Passage> {
        texts.iter().map(|t| Passage::new(*t, None)).collect()
    }

    #[test]
    fn empty_context_uses_marker_without_header() {
        let p = assemble::<&str>("What is Article 1?", &[], &PromptPolicy::default());
        assert!(p.contains(NO_CONTEXT));
        assert!(!p.contains(CONTEXT_HEADER));
        assert!(!p.contains("Excerpt"));
        assert!(p.starts_with("[INST] <<SYS>>"));
        assert!(p.ends_with("[/INST]"));
    }

    #[test]
    fn excerpts_are_numbered_in_rank_order_and_separated() {
        let p = assemble(
            "Who may amend the Constitution?",
            &["Article 91 text", "Article 44 text"],
            &PromptPolicy::default(),
        );
        let first = p.find("Excerpt 1:\nArticle 91 text").unwrap();
        let second = p.find("Excerpt 2:\nArticle 44 text").unwrap();
        assert!(first < second);
        assert!(p[first..second].contains("---"));
        assert!(p.contains("Question: Who may amend the Constitution?"));
        assert!(p.contains(DEFAULT_PERSONA));
    }

    #[test]
    fn sources_are_labeled() {
        let p = assemble_passages(
            "q",
            &[Passage::new("text", Some("constitution.pdf".into()))],
            &PromptPolicy::default(),
        );
        assert!(p.contains("Excerpt 1 (source: constitution.pdf):"));
    }

    #[test]
    fn plain_format_has_no_instruct_markers() {
        let policy = PromptPolicy {
            format: PromptFormat::Plain,
            ..PromptPolicy::default()
        };
        let p = assemble("q", &["a"], &policy);
        assert!(!p.contains("[INST]"));
        assert!(p.starts_with("System:\n"));
        assert!(p.ends_with("Answer:"));
    }

    #[test]
    fn budget_drops_tail_first() {
        let ps = passages(&["aaaa", "bbbb", "cccc"]);
        let used = budget(&ps, Some(9));
        assert_eq!(used, passages(&["aaaa", "bbbb"]));
        assert_eq!(budget(&used, Some(9)), used);
        assert_eq!(budget(&ps, None).len(), 3);
    }

    #[test]
    fn oversized_top_excerpt_is_truncated_on_char_boundary() {
        let ps = passages(&["Қазақстан Республикасы", "tail"]);
        let used = budget(&ps, Some(5));
        assert_eq!(used, passages(&["Қазақ"]));
        assert!(budget(&ps, Some(0)).is_empty());
    }

    #[test]
    fn prompt_format_parses() {
        assert_eq!("plain".parse::<PromptFormat>().unwrap(), PromptFormat::Plain);
        assert!("xml".parse::<PromptFormat>().is_err());
    }
}

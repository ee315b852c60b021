//! Prompt assembly.
//!
//! Each gateway operation gets one user prompt built from the learner's
//! materials plus an operation-specific instruction block.

use crate::roadmap::types::{ChatMessage, ChatRole, LearningMaterial, MaterialKind};

/// Topic name used for doubts asked outside any topic.
pub const GENERAL_TOPIC: &str = "general concepts";

/// Render the materials as a prompt section, one paragraph per material.
pub fn format_materials(materials: &[LearningMaterial]) -> String {
    materials
        .iter()
        .map(|m| match m.kind {
            MaterialKind::Topic => format!("The user wants to learn about: \"{}\".", m.content),
            MaterialKind::Text => {
                format!("The user provided the following text:\n---\n{}\n---", m.content)
            }
            MaterialKind::File => format!(
                "The user uploaded a file named \"{}\". Its content is provided as inline data.",
                m.content
            ),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn roadmap_prompt(materials: &[LearningMaterial]) -> String {
    format!(
        "You are an expert curriculum designer. Using the learning materials below, design a \
complete step-by-step learning roadmap. Split it into logical modules; each module holds \
several focused topics, and each topic gets a one-sentence description.

Learning Materials:
{materials}

Respond ONLY with a JSON array of modules. Each module is an object with \"title\" (string) \
and \"topics\" (array of objects with \"title\" and \"description\" strings). Do not add any \
introductory text or markdown formatting.
",
        materials = format_materials(materials)
    )
}

pub fn content_prompt(topic_title: &str, materials: &[LearningMaterial]) -> String {
    format!(
        "You are an expert educator. Write detailed learning content for one topic, drawing on \
the context materials.

Context Materials:
{materials}

Topic to explain: \"{topic_title}\"

Provide:
1. A clear, in-depth explanation of the topic.
2. At least two distinct, helpful examples illustrating it.
3. A glossary of key terms used in the explanation with short definitions.

Respond ONLY with a JSON object with keys \"explanation\" (string), \"examples\" (array of \
strings) and \"glossary\" (array of objects with \"term\" and \"definition\").
",
        materials = format_materials(materials)
    )
}

pub fn examples_prompt(topic_title: &str, materials: &[LearningMaterial], existing: &[String]) -> String {
    let already_seen = if existing.is_empty() {
        String::new()
    } else {
        format!(
            "The student has already seen these examples, so provide different ones:\n- {}",
            existing.join("\n- ")
        )
    };

    format!(
        "You are a creative educator. Produce a few (2 or 3) new, distinct examples that help a \
student understand a topic. Vary the form: short stories, real-world analogies, code snippets \
or simple comparisons, whichever suits the topic best.

Context Materials:
{materials}

Topic to illustrate: \"{topic_title}\"

{already_seen}

Respond ONLY with a JSON array of strings.
",
        materials = format_materials(materials)
    )
}

/// Render a transcript as `Student:` / `Assistant:` lines.
pub fn format_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|msg| {
            let speaker = match msg.role {
                ChatRole::User => "Student",
                ChatRole::Model => "Assistant",
            };
            format!("{speaker}: {}", msg.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn doubt_prompt(
    question: &str,
    history: &[ChatMessage],
    materials: &[LearningMaterial],
    topic_title: &str,
    highlighted: Option<&str>,
) -> String {
    let highlighted = highlighted
        .filter(|h| !h.trim().is_empty())
        .map(|h| {
            format!(
                "The student has highlighted the following text for additional context:\n---\n{h}\n---\n"
            )
        })
        .unwrap_or_default();

    let topic_title = if topic_title.trim().is_empty() {
        GENERAL_TOPIC
    } else {
        topic_title
    };

    format!(
        "You are a friendly, knowledgeable teaching assistant. A student has a question about \
their learning materials; answer it clearly and concisely.

Learning Materials Context:
{materials}

Current Topic Context: The student is currently studying \"{topic_title}\".

{highlighted}
Conversation History:
{history}

Student's new question: \"{question}\"

Answer the new question using all of the context above. If the question is blank, explain the \
highlighted context. Be helpful and encouraging.
",
        materials = format_materials(materials),
        history = format_history(history),
    )
}

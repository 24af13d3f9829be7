pub const WARMUP_PROMPT: &str = "<s>[INST] Hi [/INST]";
pub const WARMUP_MAX_TOKENS: u32 = 5;
pub const WARMUP_TEMPERATURE: f32 = 0.1;

const MAX_TOKENS_CAP: usize = 4000;
const MAX_TOKENS_HEADROOM: usize = 500;

const EDITOR_RULES: &str = "You are a precise contract editor that applies the user's instructions to legal documents.

Rules:
1. Make every change the instruction asks for; several changes may be requested at once.
2. Change only what the instruction names and keep all other wording exactly as it is.
3. Pay close attention to company names, addresses, dates and amounts.
4. Quoted text in the instruction (for example from 'ABC Inc.' to 'XYZ Corp.') must be matched and replaced exactly.
5. If the exact text is absent, look for the closest text with the same meaning in context.
6. Return the complete text you were given with the changes applied and no commentary.
";

const MARKUP_RULES: &str = "The text is HTML. Keep every tag, attribute and class exactly as it is and only change the text between tags.
";

/// Token budget for one chunk: the chunk length plus headroom, capped.
pub fn max_tokens_for(chunk_chars: usize) -> u32 {
    (chunk_chars + MAX_TOKENS_HEADROOM).min(MAX_TOKENS_CAP) as u32
}

/// Build the instruction-tagged prompt for chunk `position` (1-based) of `total`.
pub fn chunk_prompt(
    chunk: &str,
    position: usize,
    total: usize,
    instruction: &str,
    markup: bool,
) -> String {
    let mut prompt = String::with_capacity(chunk.len() + instruction.len() + 1024);
    prompt.push_str("<s>[INST] ");
    prompt.push_str(EDITOR_RULES);
    if markup {
        prompt.push_str(MARKUP_RULES);
    }
    prompt.push_str(&format!(
        "\nYou are editing part {position} of {total} of a document.\n\nText of part {position}/{total}:\n\"{chunk}\"\n\n---\nInstruction: {instruction}\n\n"
    ));
    prompt.push_str(
        "Parts of the instruction may concern other parts of the document; apply only what fits this part and return the full text of this part.",
    );
    prompt.push_str(" [/INST]");
    prompt
}

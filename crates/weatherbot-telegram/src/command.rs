//! Bot command parsing.
//!
//! A message is a command when its first entity is a `bot_command` starting at
//! offset 0. `/city@SomeBot Paris` has command `city` and arguments `Paris`.

use crate::types::{Message, MessageEntity};

const BOT_COMMAND: &str = "bot_command";

impl Message {
    fn command_entity(&self) -> Option<&MessageEntity> {
        self.entities
            .first()
            .filter(|e| e.offset == 0 && e.kind == BOT_COMMAND)
    }

    /// Byte range end of the command token within `text`
    fn command_end(&self) -> Option<(&str, usize)> {
        let text = self.text.as_deref()?;
        let entity = self.command_entity()?;
        let end = utf16_to_byte_index(text, entity.length)?;
        Some((text, end))
    }

    pub fn is_command(&self) -> bool {
        self.command_end().is_some()
    }

    /// Command name without the leading `/` and any `@botname` suffix
    pub fn command(&self) -> Option<&str> {
        let (text, end) = self.command_end()?;
        let token = text[..end].trim_start_matches('/');
        Some(token.split('@').next().unwrap_or(token))
    }

    /// Text after the command token, trimmed. Empty when there is none.
    pub fn command_arguments(&self) -> Option<&str> {
        let (text, end) = self.command_end()?;
        Some(text[end..].trim())
    }
}

/// Map a UTF-16 code unit position to a byte index, `None` if it falls
/// outside the text or inside a surrogate pair.
fn utf16_to_byte_index(text: &str, utf16_pos: usize) -> Option<usize> {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        if units == utf16_pos {
            return Some(idx);
        }
        if units > utf16_pos {
            return None;
        }
        units += ch.len_utf16();
    }
    (units == utf16_pos).then_some(text.len())
}

/// One "key: value" record from a multi-line block listing
/// (`apt-cache show`, `yum info`, `snap info`, `flatpak info`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    fields: Vec<(String, String)>,
}

impl Block {
    /// First value for `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn push(&mut self, key: &str, value: &str) {
        self.fields.push((key.trim().to_string(), value.trim().to_string()));
    }

    fn continue_last(&mut self, line: &str) {
        if let Some((_, value)) = self.fields.last_mut() {
            // yum aligns continuations as "             : more text"
            let text = line.trim().trim_start_matches(':').trim();
            if text == "." {
                value.push('\n');
            } else {
                if !value.is_empty() {
                    value.push('\n');
                }
                value.push_str(text);
            }
        }
    }
}

/// Parse blank-line separated "key: value" blocks.
///
/// Indented lines continue the previous value (Debian control format).
/// Lines without a colon outside a continuation are ignored, which skips
/// banners such as "Installed Packages".
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current = Block::default();

    for line in super::output_lines(text) {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if !current.is_empty() && split_key_value(line).is_none_or(|(k, _)| k.contains(' ')) {
                current.continue_last(line);
                continue;
            }
        }

        if let Some((key, value)) = split_key_value(line) {
            current.push(key, value);
        } else if !current.is_empty() {
            current.continue_last(line);
        }
    }

    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Split `Key   : value` on the first colon, allowing aligned keys.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || key.len() > 40 {
        return None;
    }
    Some((key, value))
}

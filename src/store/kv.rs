/// Loose `key: value` text document.
///
/// `key: a, b` gives a list inline; a bare `key:` line collects the `- item`
/// bullets that follow it. Bullets before any key land under the empty key.
#[derive(Debug, Default)]
pub struct KvDoc {
    entries: Vec<Entry>,
    lines: Vec<String>,
}

#[derive(Debug)]
struct Entry {
    key: String,
    raw: String,
    items: Vec<String>,
}

fn normalize_key(k: &str) -> String {
    k.trim().to_lowercase().replace([' ', '-'], "_")
}

fn split_inline(v: &str) -> Vec<String> {
    v.split([',', '、'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn strip_bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "・"]
        .iter()
        .find_map(|b| line.strip_prefix(b))
        .map(str::trim)
}

impl KvDoc {
    pub fn parse(text: &str) -> Self {
        let mut doc = KvDoc::default();
        let mut current = Entry { key: String::new(), raw: String::new(), items: Vec::new() };

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(item) = strip_bullet(line) {
                doc.lines.push(item.to_string());
                current.items.extend(
                    item.split('、').map(str::trim).filter(|s| !s.is_empty()).map(String::from),
                );
                continue;
            }
            doc.lines.push(line.to_string());
            let Some((k, v)) = line.split_once([':', '：']) else {
                continue;
            };
            let next = Entry { key: normalize_key(k), raw: v.trim().to_string(), items: split_inline(v) };
            doc.entries.push(std::mem::replace(&mut current, next));
        }
        doc.entries.push(current);
        doc
    }

    fn matching<'a>(&'a self, keys: &'a [&str]) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries
            .iter()
            .filter(move |e| keys.iter().any(|k| normalize_key(k) == e.key))
    }

    /// First non-empty scalar value under any of `keys`.
    pub fn first(&self, keys: &[&str]) -> Option<String> {
        self.matching(keys).find_map(|e| {
            if !e.raw.is_empty() {
                Some(e.raw.clone())
            } else {
                e.items.first().cloned()
            }
        })
    }

    pub fn list(&self, keys: &[&str]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for item in self.matching(keys).flat_map(|e| e.items.iter()) {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }
        out
    }

    /// Items of the form `name: value`.
    pub fn pairs(&self, keys: &[&str]) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for e in self.matching(keys) {
            let items: Vec<&str> = if e.items.is_empty() && !e.raw.is_empty() {
                vec![e.raw.as_str()]
            } else {
                e.items.iter().map(String::as_str).collect()
            };
            for item in items {
                if let Some((name, value)) = item.split_once([':', '：']) {
                    out.push((name.trim().to_string(), value.trim().to_string()));
                }
            }
        }
        out
    }

    /// Every meaningful line, bullets stripped.
    pub fn lines(&self) -> Vec<String> {
        self.lines.clone()
    }
}

/// `4`, `4/5`, or `★★★★`.
pub fn parse_rating(s: &str) -> Option<u8> {
    let s = s.trim();
    let stars = s.chars().filter(|c| *c == '★').count();
    if stars > 0 {
        return Some(stars.min(5) as u8);
    }
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u8>() {
        Ok(n) if (1..=5).contains(&n) => Some(n),
        _ => None,
    }
}

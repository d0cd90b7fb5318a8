//! Frame definitions: a name plus ordered payload groups.

use regex::Regex;

/// A run of `count` payload tokens that all match one pattern.
#[derive(Debug, Clone)]
pub struct PayloadGroup {
    count: usize,
    pattern: Regex,
    optional: bool,
}

impl PayloadGroup {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Whole-token match against the group's pattern
    pub fn matches(&self, token: &str) -> bool {
        self.pattern.is_match(token)
    }
}

/// Immutable description of one frame. Token counts are fixed at build time.
#[derive(Debug, Clone)]
pub struct FrameDef {
    name: String,
    desc: String,
    groups: Vec<PayloadGroup>,
    required_count: usize,
    total_count: usize,
}

impl FrameDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn groups(&self) -> &[PayloadGroup] {
        &self.groups
    }

    /// Payload tokens when every optional group is absent
    pub fn required_count(&self) -> usize {
        self.required_count
    }

    /// Payload tokens when every optional group is present
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Whether a payload of `len` tokens has an acceptable size
    pub fn accepts_len(&self, len: usize) -> bool {
        len == self.required_count || len == self.total_count
    }
}

/// Builder for [`FrameDef`]. Patterns are anchored to the whole token.
#[derive(Debug)]
pub struct FrameBuilder {
    name: String,
    desc: String,
    groups: Vec<(usize, String, bool)>,
}

impl FrameBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: String::new(),
            groups: Vec::new(),
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn payload(self, count: usize, pattern: &str) -> Self {
        self.group(count, pattern, false)
    }

    pub fn optional_payload(self, count: usize, pattern: &str) -> Self {
        self.group(count, pattern, true)
    }

    fn group(mut self, count: usize, pattern: &str, optional: bool) -> Self {
        self.groups.push((count, pattern.to_string(), optional));
        self
    }

    /// Compile every pattern and freeze the token counts
    pub fn build(self) -> Result<FrameDef, regex::Error> {
        let mut groups = Vec::with_capacity(self.groups.len());
        let mut required_count = 0;
        let mut total_count = 0;

        for (count, pattern, optional) in self.groups {
            let pattern = Regex::new(&format!("^(?:{})$", pattern))?;
            if !optional {
                required_count += count;
            }
            total_count += count;
            groups.push(PayloadGroup {
                count,
                pattern,
                optional,
            });
        }

        Ok(FrameDef {
            name: self.name,
            desc: self.desc,
            groups,
            required_count,
            total_count,
        })
    }
}

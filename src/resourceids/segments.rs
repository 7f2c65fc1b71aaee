//! Segment grammar shared by every typed resource ID
//!
//! An ARM resource ID is a sequence of positional path segments. Each typed
//! ID declares its segments once; parsing and example generation are driven
//! from that declaration.

use std::collections::HashMap;
use thiserror::Error;

/// Errors produced while parsing a resource ID
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceIdError {
    #[error("parsing {kind} ID: the ID was empty, expected format {expected}")]
    Empty { kind: &'static str, expected: String },

    #[error("parsing {kind} ID {input:?}: missing segment {segment:?}, expected format {expected}")]
    MissingSegment {
        kind: &'static str,
        input: String,
        segment: &'static str,
        expected: String,
    },

    #[error("parsing {kind} ID {input:?}: segment {position} should be {wanted:?} but was {found:?}")]
    UnexpectedSegment {
        kind: &'static str,
        input: String,
        position: usize,
        wanted: String,
        found: String,
    },

    #[error("parsing {kind} ID {input:?}: segment {segment:?} was empty")]
    EmptySegment {
        kind: &'static str,
        input: String,
        segment: &'static str,
    },

    #[error("parsing {kind} ID {input:?}: unexpected trailing segments {trailing:?}, expected format {expected}")]
    TrailingSegments {
        kind: &'static str,
        input: String,
        trailing: String,
        expected: String,
    },
}

/// What a segment position is allowed to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// A fixed literal key, e.g. `subscriptions`
    Static(&'static str),
    /// A fixed resource provider namespace, e.g. `Microsoft.Storage`
    ResourceProvider(&'static str),
    /// One of a closed set of values, e.g. `default` for blob services
    Constant(&'static [&'static str]),
    SubscriptionId,
    ResourceGroupName,
    /// A free, non-empty value chosen by the user
    UserSpecified,
}

/// A named position in a resource ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub name: &'static str,
    pub kind: SegmentKind,
    pub example: &'static str,
}

impl Segment {
    pub const fn fixed(name: &'static str, value: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::Static(value),
            example: value,
        }
    }

    pub const fn provider(name: &'static str, namespace: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::ResourceProvider(namespace),
            example: namespace,
        }
    }

    pub const fn constant(
        name: &'static str,
        allowed: &'static [&'static str],
        example: &'static str,
    ) -> Self {
        Self {
            name,
            kind: SegmentKind::Constant(allowed),
            example,
        }
    }

    pub const fn subscription_id(name: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::SubscriptionId,
            example: "12345678-1234-9876-4563-123456789012",
        }
    }

    pub const fn resource_group(name: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::ResourceGroupName,
            example: "example-resource-group",
        }
    }

    pub const fn user_specified(name: &'static str, example: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::UserSpecified,
            example,
        }
    }

    /// True for segments whose value is chosen by the caller rather than fixed by the grammar
    pub fn is_value(&self) -> bool {
        matches!(
            self.kind,
            SegmentKind::Constant(_)
                | SegmentKind::SubscriptionId
                | SegmentKind::ResourceGroupName
                | SegmentKind::UserSpecified
        )
    }
}

/// Build the example path for a segment list
pub fn example_id(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(segment.example);
    }
    out
}

/// Values captured from a successful parse, keyed by segment name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedId {
    values: HashMap<&'static str, String>,
}

impl ParsedId {
    /// Get a captured value; every value segment is present after a successful parse
    pub fn get(&self, name: &str) -> String {
        self.values.get(name).cloned().unwrap_or_default()
    }
}

/// Positional matcher for one resource-ID type
pub struct IdParser {
    kind: &'static str,
    segments: Vec<Segment>,
    insensitive: bool,
}

impl IdParser {
    pub fn new(kind: &'static str, segments: Vec<Segment>) -> Self {
        Self {
            kind,
            segments,
            insensitive: false,
        }
    }

    /// Match fixed segments ignoring ASCII case
    pub fn insensitively(mut self) -> Self {
        self.insensitive = true;
        self
    }

    fn matches(&self, wanted: &str, found: &str) -> bool {
        if self.insensitive {
            wanted.eq_ignore_ascii_case(found)
        } else {
            wanted == found
        }
    }

    pub fn parse(&self, input: &str) -> Result<ParsedId, ResourceIdError> {
        let expected = example_id(&self.segments);
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        if trimmed.is_empty() {
            return Err(ResourceIdError::Empty {
                kind: self.kind,
                expected,
            });
        }

        let parts: Vec<&str> = trimmed.split('/').collect();
        let mut parsed = ParsedId::default();

        for (position, segment) in self.segments.iter().enumerate() {
            let Some(found) = parts.get(position).copied() else {
                return Err(ResourceIdError::MissingSegment {
                    kind: self.kind,
                    input: input.to_string(),
                    segment: segment.name,
                    expected,
                });
            };

            match segment.kind {
                SegmentKind::Static(wanted) | SegmentKind::ResourceProvider(wanted) => {
                    if !self.matches(wanted, found) {
                        return Err(ResourceIdError::UnexpectedSegment {
                            kind: self.kind,
                            input: input.to_string(),
                            position,
                            wanted: wanted.to_string(),
                            found: found.to_string(),
                        });
                    }
                },
                SegmentKind::Constant(allowed) => {
                    let Some(value) = allowed.iter().find(|a| self.matches(a, found)) else {
                        return Err(ResourceIdError::UnexpectedSegment {
                            kind: self.kind,
                            input: input.to_string(),
                            position,
                            wanted: allowed.join(" | "),
                            found: found.to_string(),
                        });
                    };
                    parsed.values.insert(segment.name, value.to_string());
                },
                SegmentKind::SubscriptionId
                | SegmentKind::ResourceGroupName
                | SegmentKind::UserSpecified => {
                    if found.is_empty() {
                        return Err(ResourceIdError::EmptySegment {
                            kind: self.kind,
                            input: input.to_string(),
                            segment: segment.name,
                        });
                    }
                    parsed.values.insert(segment.name, found.to_string());
                },
            }
        }

        if parts.len() > self.segments.len() {
            return Err(ResourceIdError::TrailingSegments {
                kind: self.kind,
                input: input.to_string(),
                trailing: parts[self.segments.len()..].join("/"),
                expected,
            });
        }

        Ok(parsed)
    }
}

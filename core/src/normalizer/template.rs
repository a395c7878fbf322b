// RestFault
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Message templates with `{name}` placeholders.

use crate::model::{ModelError, ModelResult};
use serde::Deserialize;
use std::fmt;

/// Errors that occur while rendering a template.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum TemplateError {
    /// The template refers to a name that has no value.
    #[error("Unknown placeholder '{0}'")]
    UnknownPlaceholder(String),
}

/// A piece of a parsed template.
#[derive(Clone, Debug, PartialEq)]
enum Segment {
    /// Text copied verbatim to the output.
    Literal(String),

    /// Name of a value to substitute.
    Placeholder(String),
}

/// A parsed message template.
///
/// Templates are literal text with `{name}` placeholders.  Braces are escaped by doubling them.
/// Parsing rejects syntax errors upfront so that broken configuration is caught at startup;
/// whether each placeholder has a value is only known when rendering.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(try_from = "String")]
pub struct Template {
    /// Original text of the template, for display purposes.
    source: String,

    /// Parsed contents of the template.
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source` into a template.
    pub fn parse<S: Into<String>>(source: S) -> ModelResult<Self> {
        let source = source.into();

        let mut segments = vec![];
        let mut literal = String::new();
        let mut chars = source.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(ModelError(format!(
                                    "Unterminated placeholder in template '{}'",
                                    source
                                )));
                            }
                            Some(ch) => name.push(ch),
                        }
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(ModelError(format!(
                            "Empty placeholder in template '{}'",
                            source
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.to_owned()));
                }
                '}' => {
                    return Err(ModelError(format!("Unmatched '}}' in template '{}'", source)));
                }
                ch => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    /// Renders the template, resolving placeholders with `lookup`.
    pub fn render<'a, F>(&self, lookup: F) -> Result<String, TemplateError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder(name) => match lookup(name) {
                    Some(value) => output.push_str(value),
                    None => return Err(TemplateError::UnknownPlaceholder(name.clone())),
                },
            }
        }
        Ok(output)
    }

    /// Returns the original text of the template.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl TryFrom<String> for Template {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Template::parse(value)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lookup function that knows about a couple of names.
    fn lookup(name: &str) -> Option<&'static str> {
        match name {
            "key" => Some("foo"),
            "code" => Some("404"),
            _ => None,
        }
    }

    #[test]
    fn test_render_literal_only() {
        let template = Template::parse("Validation failed").unwrap();
        assert_eq!("Validation failed", template.render(lookup).unwrap());
    }

    #[test]
    fn test_render_placeholders() {
        let template = Template::parse("Key {key} not found ({code})").unwrap();
        assert_eq!("Key foo not found (404)", template.render(lookup).unwrap());

        let template = Template::parse("{key}{code}").unwrap();
        assert_eq!("foo404", template.render(lookup).unwrap());

        let template = Template::parse("{ key }").unwrap();
        assert_eq!("foo", template.render(lookup).unwrap());
    }

    #[test]
    fn test_render_escapes() {
        let template = Template::parse("{{key}} is {key}, }}").unwrap();
        assert_eq!("{key} is foo, }", template.render(lookup).unwrap());
    }

    #[test]
    fn test_render_unknown_placeholder() {
        let template = Template::parse("Missing {nope}").unwrap();
        assert_eq!(
            TemplateError::UnknownPlaceholder("nope".to_owned()),
            template.render(lookup).unwrap_err()
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            ModelError("Unterminated placeholder in template 'a {b'".to_owned()),
            Template::parse("a {b").unwrap_err()
        );
        assert!(Template::parse("a {b {c}}").is_err());
        assert_eq!(
            ModelError("Empty placeholder in template 'a {}'".to_owned()),
            Template::parse("a {}").unwrap_err()
        );
        assert_eq!(
            ModelError("Unmatched '}' in template 'a } b'".to_owned()),
            Template::parse("a } b").unwrap_err()
        );
    }

    #[test]
    fn test_deserialize() {
        let template: Template = serde_json::from_str(r#""Hello {key}""#).unwrap();
        assert_eq!("Hello {key}", template.as_str());
        assert_eq!("Hello foo", template.render(lookup).unwrap());

        let err = serde_json::from_str::<Template>(r#""Hello {""#).unwrap_err();
        assert!(err.to_string().contains("Unterminated placeholder"));
    }
}

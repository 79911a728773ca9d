//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Deterministic input perturbation.
//!
//! An agitator derives additional test inputs from a base `in.yaml`;
//! each named variant is expected to match an `out-<name>.yaml` next to
//! the base expectation. Agitators are pure functions of the input text,
//! so a corpus regenerates identically run to run.

/// Derives named perturbed inputs from a base input.
pub trait YamlAgitator {
    /// Returns `(variant name, perturbed input)` pairs.
    fn agitate(&self, input: &str) -> Vec<(String, String)>;
}

/// Omits each message document in turn.
///
/// For an input of `n` documents this produces `n` variants named
/// `omit-1` through `omit-n`.
#[derive(Debug, Default)]
pub struct MessageOmission;

impl YamlAgitator for MessageOmission {
    fn agitate(&self, input: &str) -> Vec<(String, String)> {
        let documents = split_documents(input);
        if documents.len() < 2 {
            return Vec::new();
        }
        (0..documents.len())
            .map(|skip| {
                let rest: Vec<&str> = documents
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != skip)
                    .map(|(_, d)| d.as_str())
                    .collect();
                (format!("omit-{}", skip + 1), rest.join("---\n"))
            })
            .collect()
    }
}

/// Blanks the value of one field wherever it appears.
///
/// `price: 17` becomes `price:` in the variant named `blank-price`.
#[derive(Debug)]
pub struct FieldBlanking {
    field: String,
}

impl FieldBlanking {
    /// Blanks `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl YamlAgitator for FieldBlanking {
    fn agitate(&self, input: &str) -> Vec<(String, String)> {
        let needle = format!("{}:", self.field);
        let mut touched = false;
        let perturbed: Vec<String> = input
            .lines()
            .map(|line| {
                let trimmed = line.trim_start();
                if trimmed.starts_with(&needle) {
                    touched = true;
                    let indent = line.len() - trimmed.len();
                    format!("{}{}", &line[..indent], needle)
                } else {
                    line.to_owned()
                }
            })
            .collect();
        if !touched {
            return Vec::new();
        }
        vec![(
            format!("blank-{}", self.field),
            format!("{}\n", perturbed.join("\n")),
        )]
    }
}

/// Splits an input corpus on `---` separator lines.
pub(crate) fn split_documents(input: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();
    for line in input.lines() {
        if line.trim_end() == "---" || line.trim_end().starts_with("--- ") {
            documents.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    documents.push(current);
    documents.retain(|d| !d.trim().is_empty());
    documents
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "say: one\n---\nsay: two\n---\nsay: three\n";

    #[test]
    fn test_split_documents() {
        let documents = split_documents(INPUT);
        assert_eq!(documents, vec!["say: one\n", "say: two\n", "say: three\n"]);
    }

    #[test]
    fn test_message_omission() {
        let variants = MessageOmission.agitate(INPUT);
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0].0, "omit-1");
        assert_eq!(variants[0].1, "say: two\n---\nsay: three\n");
        assert_eq!(variants[2].1, "say: one\n---\nsay: two\n");
    }

    #[test]
    fn test_field_blanking() {
        let variants = FieldBlanking::new("say").agitate("say: one\nkeep: 2\n");
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].0, "blank-say");
        assert_eq!(variants[0].1, "say:\nkeep: 2\n");
    }

    #[test]
    fn test_blanking_untouched_input_yields_nothing() {
        assert!(FieldBlanking::new("missing").agitate("say: one\n").is_empty());
    }

    #[test]
    fn test_agitators_are_deterministic() {
        assert_eq!(MessageOmission.agitate(INPUT), MessageOmission.agitate(INPUT));
    }
}

// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A small line-based shader preprocessor.
//!
//! Supported directives:
//!
//! * `#define NAME [VALUE]` and `#undef NAME`
//! * `#ifdef NAME`, `#ifndef NAME`, `#else`, `#endif` (nestable)
//!
//! Any other line starting with `#` (e.g. `#version`) is passed through.
//! Macros with a non-empty value are substituted as whole identifiers in the
//! active lines, in a single pass. Directive lines and inactive lines are
//! replaced by empty lines so compiler diagnostics keep their line numbers.

use super::ShaderMacros;
use crate::renderer::error::ShaderError;

struct Branch {
    /// The enclosing region is emitted.
    parent_active: bool,
    /// The current arm of this branch is emitted.
    active: bool,
    seen_else: bool,
}

/// Runs the preprocessor over `source` with the caller's `macros` predefined.
pub fn preprocess(name: &str, source: &str, macros: &ShaderMacros) -> Result<String, ShaderError> {
    let mut defines = macros.clone();
    let mut stack: Vec<Branch> = Vec::new();
    let mut output = String::with_capacity(source.len());

    let fail = |line: usize, message: String| ShaderError::CompilationError {
        label: name.to_owned(),
        details: format!("line {line}: {message}"),
    };

    for (index, line) in source.lines().enumerate() {
        let line_number = index + 1;
        let active = stack.last().map_or(true, |branch| branch.active);
        let trimmed = line.trim_start();

        let directive = trimmed.strip_prefix('#').map(|rest| {
            let rest = rest.trim_start();
            let (keyword, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            (keyword, args.trim())
        });

        match directive {
            Some((keyword @ ("ifdef" | "ifndef"), args)) => {
                let macro_name = first_word(args)
                    .ok_or_else(|| fail(line_number, "conditional without a macro name".into()))?;
                let defined = defines.contains_key(macro_name);
                stack.push(Branch {
                    parent_active: active,
                    active: active && defined == (keyword == "ifdef"),
                    seen_else: false,
                });
            }
            Some(("else", _)) => {
                let branch = stack
                    .last_mut()
                    .ok_or_else(|| fail(line_number, "#else without #ifdef".into()))?;
                if branch.seen_else {
                    return Err(fail(line_number, "duplicate #else".into()));
                }
                branch.seen_else = true;
                branch.active = branch.parent_active && !branch.active;
            }
            Some(("endif", _)) => {
                stack
                    .pop()
                    .ok_or_else(|| fail(line_number, "#endif without #ifdef".into()))?;
            }
            Some(("define", args)) => {
                if active {
                    let (macro_name, value) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
                    if macro_name.is_empty() {
                        return Err(fail(line_number, "#define without a macro name".into()));
                    }
                    defines.insert(macro_name.to_owned(), value.trim().to_owned());
                }
            }
            Some(("undef", args)) => {
                if active {
                    let macro_name = first_word(args)
                        .ok_or_else(|| fail(line_number, "#undef without a macro name".into()))?;
                    defines.remove(macro_name);
                }
            }
            _ => {
                if active {
                    if directive.is_some() {
                        output.push_str(line);
                    } else {
                        substitute(line, &defines, &mut output);
                    }
                }
            }
        }
        output.push('\n');
    }

    if !stack.is_empty() {
        return Err(ShaderError::CompilationError {
            label: name.to_owned(),
            details: format!("{} unterminated conditional block(s)", stack.len()),
        });
    }
    Ok(output)
}

fn first_word(args: &str) -> Option<&str> {
    args.split_whitespace().next()
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn substitute(line: &str, defines: &ShaderMacros, output: &mut String) {
    let mut rest = line;
    while let Some(start) = rest.find(is_ident_start) {
        // A digit run like `1e5` must not start an identifier mid-token.
        let prefix = &rest[..start];
        let glued = prefix.chars().next_back().is_some_and(is_ident_continue);
        output.push_str(prefix);
        rest = &rest[start..];

        let end = rest.find(|c: char| !is_ident_continue(c)).unwrap_or(rest.len());
        let ident = &rest[..end];
        match defines.get(ident) {
            Some(value) if !glued && !value.is_empty() => output.push_str(value),
            _ => output.push_str(ident),
        }
        rest = &rest[end..];
    }
    output.push_str(rest);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn macros(pairs: &[(&str, &str)]) -> ShaderMacros {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn run(source: &str, pairs: &[(&str, &str)]) -> String {
        preprocess("test", source, &macros(pairs)).unwrap()
    }

    #[test]
    fn ifdef_selects_the_defined_arm() {
        let source = "#ifdef FOG\nfog();\n#else\nclear();\n#endif\n";
        assert_eq!(run(source, &[("FOG", "")]).trim(), "fog();");
        assert_eq!(run(source, &[]).trim(), "clear();");
    }

    #[test]
    fn ifndef_and_nesting() {
        let source = "\
#ifndef SKINNED
static_mesh();
#ifdef SHADOWS
shadows();
#endif
#endif
";
        let out = run(source, &[("SHADOWS", "1")]);
        assert!(out.contains("static_mesh();"));
        assert!(out.contains("shadows();"));
        let out = run(source, &[("SKINNED", ""), ("SHADOWS", "1")]);
        assert!(!out.contains("shadows();"));
    }

    #[test]
    fn line_numbers_are_preserved() {
        let source = "#define A 1\n#ifdef B\nhidden\n#endif\nvisible\n";
        let out = run(source, &[]);
        assert_eq!(out.lines().count(), 5);
        assert_eq!(out.lines().nth(4), Some("visible"));
    }

    #[test]
    fn macros_substitute_whole_identifiers_only() {
        let out = run("let x = LIGHTS + LIGHTS_MAX + 2LIGHTS;", &[("LIGHTS", "4")]);
        assert_eq!(out.trim(), "let x = 4 + LIGHTS_MAX + 2LIGHTS;");
    }

    #[test]
    fn source_defines_and_undefs_apply_in_order() {
        let source = "#define COUNT 8\nCOUNT\n#undef COUNT\nCOUNT\n";
        let out = run(source, &[]);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[1], "8");
        assert_eq!(lines[3], "COUNT");
    }

    #[test]
    fn defines_inside_inactive_blocks_are_ignored() {
        let source = "#ifdef NOPE\n#define X 1\n#endif\nX\n";
        assert_eq!(run(source, &[]).lines().nth(3), Some("X"));
    }

    #[test]
    fn unknown_directives_pass_through() {
        assert_eq!(run("#version 450\n", &[]).trim(), "#version 450");
    }

    #[test]
    fn unbalanced_conditionals_are_errors() {
        let none = ShaderMacros::new();
        assert!(preprocess("s", "#ifdef A\n", &none).is_err());
        assert!(preprocess("s", "#endif\n", &none).is_err());
        assert!(preprocess("s", "#else\n", &none).is_err());
        let err = preprocess("s", "#ifdef A\n#else\n#else\n#endif\n", &none).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }
}

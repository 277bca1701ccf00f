//! Reduction of a token stream into a validated [`DirectiveSet`].

use crate::error::{Error, Result};
use crate::resource::{IncludeContext, SourceKind};

use super::tokenizer::{DirectiveKind, Form, Line, Token, tokenize};
use super::types::{Coordinate, DirectiveSet, Located, Repository, push_unique};

/// Parses the directives of one resource.
///
/// `kind` is the kind of the unit being compiled, which for included
/// resources is the kind of the root script, not of the include itself.
pub struct DirectiveParser {
    kind: SourceKind,
    context: IncludeContext,
}

impl DirectiveParser {
    /// Create a parser for a resource compiled as `kind` with `context`.
    pub fn new(kind: SourceKind, context: IncludeContext) -> Self {
        Self { kind, context }
    }

    /// Tokenize and reduce `source`.
    pub fn parse(&self, source: &str) -> Result<DirectiveSet> {
        self.reduce(&tokenize(source))
    }

    /// Reduce already tokenized lines.
    pub fn reduce(&self, lines: &[Line<'_>]) -> Result<DirectiveSet> {
        let mut set = DirectiveSet::default();

        for line in lines {
            match &line.token {
                Token::Directive { kind, form, args } => {
                    self.apply(&mut set, *kind, *form, args)
                        .map_err(|e| at_line(e, line.number))?;
                }
                Token::Package(name) if set.package.is_none() && !name.is_empty() => {
                    set.package = Some(name.to_string());
                }
                Token::UnknownMarker(marker) => {
                    tracing::trace!("Ignoring unknown marker //{} on line {}", marker, line.number);
                }
                _ => {}
            }
        }

        Ok(set)
    }

    fn apply(
        &self,
        set: &mut DirectiveSet,
        kind: DirectiveKind,
        form: Form,
        args: &[String],
    ) -> Result<()> {
        match kind {
            DirectiveKind::Dependencies => {
                let coordinates = args
                    .iter()
                    .map(|arg| arg.parse::<Coordinate>())
                    .collect::<Result<Vec<_>>>()?;
                push_unique(&mut set.dependencies, coordinates);
            }
            DirectiveKind::Repository => {
                let repositories = match form {
                    Form::Comment => args
                        .iter()
                        .map(|arg| arg.parse::<Repository>())
                        .collect::<Result<Vec<_>>>()?,
                    Form::Annotation => match args {
                        [id, url, ..] if !id.is_empty() && !url.is_empty() => {
                            vec![Repository::new(id.as_str(), url.as_str())]
                        }
                        _ => {
                            return Err(Error::directive(
                                "@file:MavenRepository needs an id and a url",
                            ));
                        }
                    },
                };
                push_unique(&mut set.repositories, repositories);
            }
            DirectiveKind::Include => {
                let targets = self.targets("include", args)?;
                push_unique(&mut set.includes, targets);
            }
            DirectiveKind::CompileModule => {
                let targets = self.targets("compile module", args)?;
                push_unique(&mut set.compile_modules, targets);
            }
            DirectiveKind::Archive => {
                let targets = self.targets("jar", args)?;
                push_unique(&mut set.archives, targets);
            }
            DirectiveKind::RuntimeOptions => set.runtime_options.extend(args.iter().cloned()),
            DirectiveKind::CompilerOptions => set.compiler_options.extend(args.iter().cloned()),
            DirectiveKind::EntryPoint => {
                if self.kind == SourceKind::Script {
                    return Err(Error::directive(
                        "entry point directives are only supported for .kt files",
                    ));
                }
                let [entry] = args else {
                    return Err(Error::directive("entry point directive needs exactly one name"));
                };
                if set.entry_point.is_none() {
                    set.entry_point = Some(entry.clone());
                }
            }
        }

        Ok(())
    }

    fn targets(&self, what: &str, args: &[String]) -> Result<Vec<Located<String>>> {
        if args.is_empty() {
            return Err(Error::directive(format!("{} directive without a target", what)));
        }

        Ok(args
            .iter()
            .map(|arg| Located {
                value: arg.clone(),
                context: self.context.clone(),
            })
            .collect())
    }
}

fn at_line(err: Error, number: usize) -> Error {
    match err {
        Error::Directive { line: None, message } => Error::Directive {
            line: Some(number),
            message,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn script_parser() -> DirectiveParser {
        DirectiveParser::new(SourceKind::Script, IncludeContext::Dir(PathBuf::from("/work")))
    }

    fn class_parser() -> DirectiveParser {
        DirectiveParser::new(SourceKind::Class, IncludeContext::Dir(PathBuf::from("/work")))
    }

    #[test]
    fn test_parse_script_directives() {
        let source = r#"#!/usr/bin/env ktrun
//DEPS com.squareup.okio:okio:3.6.0, com.github.ajalt.clikt:clikt:4.2.1
@file:DependsOn("com.squareup.okio:okio:3.6.0")
//MAVEN_REPO jitpack=https://jitpack.io
@file:MavenRepository("central", "https://repo1.maven.org/maven2")
//INCLUDE util.kts
//COMPILE modules/model.kt
//JAR libs/a.jar libs/b.jar
//KOTLIN_OPTS -J-Xmx2g
//COMPILER_OPTS -jvm-target 17
//FUTURE_MARKER whatever

println("hi")
"#;
        let set = script_parser().parse(source).unwrap();

        assert_eq!(
            set.dependencies,
            vec![
                Coordinate::new("com.squareup.okio", "okio", "3.6.0"),
                Coordinate::new("com.github.ajalt.clikt", "clikt", "4.2.1"),
            ]
        );
        assert_eq!(
            set.repositories,
            vec![
                Repository::new("jitpack", "https://jitpack.io"),
                Repository::new("central", "https://repo1.maven.org/maven2"),
            ]
        );
        assert_eq!(set.includes[0].value, "util.kts");
        assert_eq!(set.compile_modules[0].value, "modules/model.kt");
        assert_eq!(set.compile_modules[0].context, IncludeContext::Dir(PathBuf::from("/work")));
        assert_eq!(set.archives.len(), 2);
        assert_eq!(set.runtime_options, vec!["-J-Xmx2g"]);
        assert_eq!(set.compiler_options, vec!["-jvm-target", "17"]);
        assert_eq!(set.entry_point, None);
    }

    #[test]
    fn test_entry_point_only_for_class_files() {
        let err = script_parser().parse("//ENTRY Main\nprintln(1)").unwrap_err();
        assert!(matches!(err, Error::Directive { line: Some(1), .. }));

        let set = class_parser()
            .parse("package tools\n//ENTRY tools.Main\nfun main() {}")
            .unwrap();
        assert_eq!(set.entry_point.as_deref(), Some("tools.Main"));
        assert_eq!(set.package.as_deref(), Some("tools"));
    }

    #[test]
    fn test_malformed_coordinate_reports_line() {
        let err = script_parser()
            .parse("println(1)\n//DEPS not-a-coordinate")
            .unwrap_err();
        match err {
            Error::Directive { line, message } => {
                assert_eq!(line, Some(2));
                assert!(message.contains("not-a-coordinate"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_repository_annotation() {
        let err = script_parser()
            .parse(r#"@file:MavenRepository("only-id")"#)
            .unwrap_err();
        assert!(matches!(err, Error::Directive { .. }));
    }

    #[test]
    fn test_include_without_target() {
        assert!(script_parser().parse("//INCLUDE").is_err());
    }

    #[test]
    fn test_plain_source_has_no_directives() {
        let set = script_parser().parse("println(1+1)").unwrap();
        assert_eq!(set, DirectiveSet::default());
    }
}

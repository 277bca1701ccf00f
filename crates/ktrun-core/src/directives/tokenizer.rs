//! Line tokenizer for directives.
//!
//! Tokenizing never fails: every line maps to exactly one [`Token`], and
//! anything that isn't a recognized marker is [`Token::Code`] or
//! [`Token::UnknownMarker`]. Validation happens later, in the reduction.

/// Kinds of recognized directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Dependencies,
    Repository,
    Include,
    CompileModule,
    Archive,
    RuntimeOptions,
    CompilerOptions,
    EntryPoint,
}

impl DirectiveKind {
    /// Kind for a `//MARKER` comment.
    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "DEPS" => Some(Self::Dependencies),
            "MAVEN_REPO" => Some(Self::Repository),
            "INCLUDE" => Some(Self::Include),
            "COMPILE" => Some(Self::CompileModule),
            "JAR" => Some(Self::Archive),
            "KOTLIN_OPTS" => Some(Self::RuntimeOptions),
            "COMPILER_OPTS" => Some(Self::CompilerOptions),
            "ENTRY" => Some(Self::EntryPoint),
            _ => None,
        }
    }

    /// Kind for a `@file:Annotation(...)` line.
    fn from_annotation(name: &str) -> Option<Self> {
        match name {
            "DependsOn" | "DependsOnMaven" => Some(Self::Dependencies),
            "MavenRepository" => Some(Self::Repository),
            "Include" => Some(Self::Include),
            "CompileModule" => Some(Self::CompileModule),
            "Jar" => Some(Self::Archive),
            "KotlinOpts" => Some(Self::RuntimeOptions),
            "CompilerOpts" => Some(Self::CompilerOptions),
            "EntryPoint" => Some(Self::EntryPoint),
            _ => None,
        }
    }
}

/// Syntax a directive was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// `//DEPS a:b:1`
    Comment,
    /// `@file:DependsOn("a:b:1")`
    Annotation,
}

/// Classification of one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// A recognized directive with its raw arguments.
    Directive {
        kind: DirectiveKind,
        form: Form,
        args: Vec<String>,
    },
    /// A `//UPPER_CASE` marker ktrun doesn't know.
    UnknownMarker(&'a str),
    /// `package a.b` with the package name.
    Package(&'a str),
    /// An `import` line, trimmed.
    Import(&'a str),
    /// A `@file:` annotation that isn't a directive, trimmed.
    FileAnnotation(&'a str),
    /// `#!` interpreter line.
    Shebang,
    /// Anything else.
    Code,
}

/// A tokenized source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    /// 1-indexed line number.
    pub number: usize,
    /// Original text without the line terminator.
    pub text: &'a str,
    pub token: Token<'a>,
}

/// Tokenize every line of `source`.
pub fn tokenize(source: &str) -> Vec<Line<'_>> {
    source
        .lines()
        .enumerate()
        .map(|(i, text)| Line {
            number: i + 1,
            text,
            token: classify(text),
        })
        .collect()
}

/// Classify a single line.
pub fn classify(text: &str) -> Token<'_> {
    let trimmed = text.trim();

    if trimmed.starts_with("#!") {
        return Token::Shebang;
    }

    if let Some(rest) = trimmed.strip_prefix("//") {
        return classify_comment(rest);
    }

    if let Some(rest) = trimmed.strip_prefix("@file:") {
        return classify_annotation(trimmed, rest);
    }

    if let Some(name) = keyword_argument(trimmed, "package") {
        return Token::Package(name.trim_end_matches(';').trim());
    }

    if keyword_argument(trimmed, "import").is_some() {
        return Token::Import(trimmed);
    }

    Token::Code
}

/// `rest` is the comment body right after `//`.
fn classify_comment(rest: &str) -> Token<'_> {
    let marker_end = rest
        .find(|c: char| !(c.is_ascii_uppercase() || c == '_'))
        .unwrap_or(rest.len());
    let marker = &rest[..marker_end];
    let tail = &rest[marker_end..];

    // Markers are glued to the slashes and followed by whitespace or EOL.
    if marker.len() < 2 || !(tail.is_empty() || tail.starts_with(char::is_whitespace)) {
        return Token::Code;
    }

    let Some(kind) = DirectiveKind::from_marker(marker) else {
        return Token::UnknownMarker(marker);
    };

    let tail = tail.trim();
    let args = match kind {
        DirectiveKind::Include | DirectiveKind::CompileModule | DirectiveKind::EntryPoint => {
            if tail.is_empty() {
                Vec::new()
            } else {
                vec![tail.to_string()]
            }
        }
        DirectiveKind::Dependencies | DirectiveKind::Repository | DirectiveKind::Archive => tail
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        DirectiveKind::RuntimeOptions | DirectiveKind::CompilerOptions => {
            tail.split_whitespace().map(String::from).collect()
        }
    };

    Token::Directive {
        kind,
        form: Form::Comment,
        args,
    }
}

/// `rest` is the annotation right after `@file:`.
fn classify_annotation<'a>(trimmed: &'a str, rest: &str) -> Token<'a> {
    let name_end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let name = &rest[..name_end];

    let Some(kind) = DirectiveKind::from_annotation(name) else {
        return Token::FileAnnotation(trimmed);
    };

    let tail = rest[name_end..].trim_start();
    let Some(body) = tail.strip_prefix('(') else {
        return Token::FileAnnotation(trimmed);
    };

    Token::Directive {
        kind,
        form: Form::Annotation,
        args: string_literals(body),
    }
}

/// `line` starts with `keyword` followed by whitespace; returns the rest.
fn keyword_argument<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Collect the double-quoted string literals up to the closing parenthesis.
fn string_literals(body: &str) -> Vec<String> {
    let mut literals = Vec::new();
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            ')' => break,
            '"' => {
                let mut literal = String::new();
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                literal.push(escaped);
                            }
                        }
                        '"' => break,
                        other => literal.push(other),
                    }
                }
                literals.push(literal);
            }
            _ => {}
        }
    }

    literals
}

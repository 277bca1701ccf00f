//! Build directives embedded in source comments.
//!
//! # Format
//!
//! ```text
//! //DEPS com.squareup.okio:okio:3.6.0, org.slf4j:slf4j-simple:2.0.9
//! //MAVEN_REPO jitpack=https://jitpack.io
//! //INCLUDE util.kts
//! //COMPILE modules/model.kt
//! //JAR libs/legacy.jar
//! //KOTLIN_OPTS -J-Xmx2g
//! //COMPILER_OPTS -jvm-target 17
//! //ENTRY tools.Main          (.kt files only)
//!
//! @file:DependsOn("com.squareup.okio:okio:3.6.0")   // annotation forms
//! ```
//!
//! Parsing happens in two steps: [`tokenize`] classifies every line without
//! failing, then [`DirectiveParser`] reduces the tokens and validates them.

mod parser;
mod tokenizer;
mod types;

pub use parser::DirectiveParser;
pub use tokenizer::{DirectiveKind, Form, Line, Token, classify, tokenize};
pub use types::{Coordinate, DirectiveSet, Located, Repository};

//! Class names and entry symbols.
//!
//! The launcher needs one invocable class per artifact. For class-style
//! sources that is the `main` function's file facade (or an explicit
//! `//ENTRY`). Scripts compile to a class named after the file, so they get
//! a small generated wrapper `Main_<Name>` that loads the script class by
//! name and instantiates it with the program arguments.

use crate::resource::SourceKind;

/// Prefix of the generated script wrapper class.
pub const WRAPPER_PREFIX: &str = "Main_";

/// Turn a base name into a JVM class name.
///
/// Every non-alphanumeric character becomes `_`, the first letter is
/// capitalized, and a leading digit gets a `_` prefix. Distinct base names
/// can collide (`a-b` and `a_b` both give `A_b`).
pub fn normalize_name(base_name: &str) -> String {
    let mut name: String = base_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if let Some(first) = name.chars().next() {
        if first.is_ascii_digit() {
            name.insert(0, '_');
        } else if first.is_ascii_lowercase() {
            name.replace_range(..1, &first.to_ascii_uppercase().to_string());
        }
    }

    if name.is_empty() { "_".to_string() } else { name }
}

/// `package.name`, or `name` alone without a package.
pub fn qualify(package: Option<&str>, name: &str) -> String {
    match package {
        Some(package) if !package.is_empty() => format!("{}.{}", package, name),
        _ => name.to_string(),
    }
}

/// Simple name of the wrapper generated for a script.
pub fn wrapper_class_name(base_name: &str) -> String {
    format!("{}{}", WRAPPER_PREFIX, normalize_name(base_name))
}

/// Kotlin source of the wrapper for a script.
pub fn wrapper_source(base_name: &str, package: Option<&str>) -> String {
    let wrapper = wrapper_class_name(base_name);
    let script_class = qualify(package, &normalize_name(base_name));

    let mut source = String::new();
    if let Some(package) = package.filter(|p| !p.is_empty()) {
        source.push_str(&format!("package {}\n\n", package));
    }
    source.push_str(&format!(
        r#"class {wrapper} {{
    companion object {{
        @JvmStatic
        fun main(args: Array<String>) {{
            val script = {wrapper}::class.java.classLoader.loadClass("{script_class}")
            script.getDeclaredConstructor(Array<String>::class.java).newInstance(args)
        }}
    }}
}}
"#
    ));
    source
}

/// Fully qualified class the launcher invokes.
///
/// Scripts always go through their wrapper. Class-style sources use the
/// explicit entry point when one is declared, otherwise the file facade
/// class `<Name>Kt` in the declared package.
pub fn entry_symbol(
    kind: SourceKind,
    base_name: &str,
    package: Option<&str>,
    entry_point: Option<&str>,
) -> String {
    match kind {
        SourceKind::Script => qualify(package, &wrapper_class_name(base_name)),
        SourceKind::Class => match entry_point {
            Some(entry) => entry.to_string(),
            None => qualify(package, &format!("{}Kt", normalize_name(base_name))),
        },
    }
}

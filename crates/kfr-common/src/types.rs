//! Core domain types shared across the KFR crates.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INVOCATION: AtomicU64 = AtomicU64::new(1);

/// Invocation identifier - names one run of an external program in logs
/// and errors.
///
/// # Example
/// ```
/// use kfr_common::InvocationId;
///
/// let a = InvocationId::next();
/// let b = InvocationId::next();
/// assert_ne!(a, b);
/// assert!(a.as_str().starts_with("inv-"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvocationId(String);

impl InvocationId {
    /// Allocates a fresh, process-unique identifier.
    pub fn next() -> Self {
        let n = NEXT_INVOCATION.fetch_add(1, Ordering::Relaxed);
        Self(format!("inv-{}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InvocationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InvocationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered, non-empty argument vector. Element 0 is the program.
///
/// The runner treats the arguments as opaque; they are never passed through
/// a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    /// Builds a command line, returning `None` when `argv` is empty.
    pub fn new<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        if argv.is_empty() {
            None
        } else {
            Some(Self(argv))
        }
    }

    /// Builds a command line from a program and its arguments.
    pub fn from_parts<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![program.into()];
        argv.extend(args.into_iter().map(Into::into));
        Self(argv)
    }

    pub fn program(&self) -> &str {
        &self.0[0]
    }

    pub fn args(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_id() {
        let id = InvocationId::from("inv-42");
        assert_eq!(id.as_str(), "inv-42");
        assert_eq!(id.to_string(), "inv-42");
    }

    #[test]
    fn test_command_line_parts() {
        let cmd = CommandLine::new(["java", "-jar", "freerouting.jar"]).unwrap();
        assert_eq!(cmd.program(), "java");
        assert_eq!(cmd.args(), &["-jar".to_string(), "freerouting.jar".to_string()]);
        assert_eq!(cmd.to_string(), "java -jar freerouting.jar");
    }

    #[test]
    fn test_from_parts() {
        let cmd = CommandLine::from_parts("sleep", ["30"]);
        assert_eq!(cmd.as_slice(), ["sleep", "30"]);
    }

    #[test]
    fn test_empty_command_line_rejected() {
        assert!(CommandLine::new(Vec::<String>::new()).is_none());
    }
}

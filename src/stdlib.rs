//! Thin wrappers over the host: file system, processes, environment
//! variables and string utilities. The runtime's built-ins call into these.

pub mod fs_ops {
    use std::fs::{self, OpenOptions};
    use std::io::{self, Write};
    use std::path::Path;

    pub fn exists(path: &str) -> bool {
        Path::new(path).exists()
    }

    pub fn read(path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }

    pub fn write(path: &str, content: &str, append: bool) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        file.write_all(content.as_bytes())
    }

    pub fn remove(path: &str) -> io::Result<()> {
        fs::remove_file(path)
    }
}

pub mod process {
    use std::io;
    use std::process::{Command, Stdio};

    fn shell(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }

    /// Run `command` through the shell and capture its standard output.
    pub fn exec_capture(command: &str) -> io::Result<String> {
        let output = shell(command).stderr(Stdio::inherit()).output()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run `command` with inherited stdio and wait for it to finish.
    pub fn exec(command: &str) -> io::Result<i32> {
        let status = shell(command).status()?;
        Ok(status.code().unwrap_or(-1))
    }

    pub fn getenv(key: &str) -> String {
        std::env::var(key).unwrap_or_default()
    }

    pub fn setenv(key: &str, value: &str) {
        std::env::set_var(key, value);
    }
}

pub mod strings {
    const WHITESPACE: &[char] = &[' ', '\t', '\n', '\r'];

    pub fn trim(s: &str) -> String {
        s.trim_matches(WHITESPACE).to_string()
    }

    /// Replace every occurrence of `from`. An empty `from` leaves `s` as is.
    pub fn replace(s: &str, from: &str, to: &str) -> String {
        if from.is_empty() {
            return s.to_string();
        }
        s.replace(from, to)
    }

    /// Split on `delimiter`; the remainder after the last delimiter is always
    /// included, so `split("a,", ",")` yields `["a", ""]`.
    pub fn split(s: &str, delimiter: &str) -> Vec<String> {
        if delimiter.is_empty() {
            return vec![s.to_string()];
        }
        s.split(delimiter).map(str::to_string).collect()
    }

    pub fn merge(parts: &[String], delimiter: &str) -> String {
        parts.join(delimiter)
    }

    pub fn contains(haystack: &str, needle: &str) -> bool {
        haystack.contains(needle)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn trim_strips_only_ascii_whitespace_set() {
            assert_eq!(trim("  \tvalue\r\n"), "value");
            assert_eq!(trim("   "), "");
        }

        #[test]
        fn replace_with_empty_pattern_is_identity() {
            assert_eq!(replace("abc", "", "x"), "abc");
            assert_eq!(replace("a-b-c", "-", "+"), "a+b+c");
        }

        #[test]
        fn split_keeps_trailing_remainder() {
            assert_eq!(split("a,b,", ","), vec!["a", "b", ""]);
            assert_eq!(split("abc", ""), vec!["abc"]);
        }

        #[test]
        fn merge_joins_with_delimiter() {
            let parts = vec!["x".to_string(), "y".to_string(), "z".to_string()];
            assert_eq!(merge(&parts, "/"), "x/y/z");
            assert_eq!(merge(&[], "/"), "");
        }
    }
}

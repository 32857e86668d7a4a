//! Plist asset-list parser (§4.C).
//!
//! `@cwd`/`@mode`/`@owner`/`@group` mutate parser state that subsequent bare
//! file lines inherit; every other directive is self-contained. Iteration
//! order equals file order and is streamed line-by-line so the installer
//! never has to buffer the whole list.

use std::io::BufRead;

use mport_schema::{AssetEntry, AssetKind};

use crate::error::BundleError;

/// Streaming parser over a plist text stream.
pub struct AssetListParser<R> {
    lines: std::io::Lines<R>,
    cwd: String,
    prefix: String,
    mode: Option<u32>,
    owner: Option<String>,
    group: Option<String>,
    skip_next: bool,
}

impl<R: BufRead> AssetListParser<R> {
    /// `prefix` is the package's install root; it is also the `@cwd`
    /// restored by a bare `@cwd` with no argument.
    pub fn new(reader: R, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            lines: reader.lines(),
            cwd: prefix.clone(),
            prefix,
            mode: None,
            owner: None,
            group: None,
            skip_next: false,
        }
    }

    fn next_entry(&mut self) -> Result<Option<AssetEntry>, BundleError> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(directive) = line.strip_prefix('@') {
                if let Some(entry) = self.apply_directive(directive)? {
                    return Ok(Some(entry));
                }
                continue;
            }

            if self.skip_next {
                self.skip_next = false;
                continue;
            }

            let path = join_cwd(&self.cwd, line);
            let mut entry = AssetEntry::new(AssetKind::File, path);
            entry.owner = self.owner.clone();
            entry.group = self.group.clone();
            entry.mode = self.mode;
            return Ok(Some(entry));
        }
    }

    /// Applies one `@directive`, returning an entry to yield or `None` when
    /// the directive only mutates parser state.
    fn apply_directive(&mut self, directive: &str) -> Result<Option<AssetEntry>, BundleError> {
        let (name, rest) = match directive.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (directive, ""),
        };

        match name {
            "cwd" => {
                self.cwd = if rest.is_empty() {
                    self.prefix.clone()
                } else {
                    rest.to_string()
                };
                Ok(None)
            }
            "mode" => {
                self.mode = u32::from_str_radix(rest, 8).ok();
                Ok(None)
            }
            "owner" => {
                self.owner = Some(rest.to_string());
                Ok(None)
            }
            "group" => {
                self.group = Some(rest.to_string());
                Ok(None)
            }
            "preexec" => Ok(Some(AssetEntry::new(AssetKind::PreExec, rest))),
            "postexec" => Ok(Some(AssetEntry::new(AssetKind::PostExec, rest))),
            "unexec" => Ok(Some(AssetEntry::new(AssetKind::UnExec, rest))),
            "sample" => {
                let mut parts = rest.split_whitespace();
                let src = parts
                    .next()
                    .ok_or_else(|| BundleError::MalformedDirective("@sample with no argument".into()))?;
                let mut entry = AssetEntry::new(AssetKind::SampleFile, join_cwd(&self.cwd, src));
                entry.alt_data = parts.next().map(|dst| join_cwd(&self.cwd, dst));
                entry.owner = self.owner.clone();
                entry.group = self.group.clone();
                entry.mode = self.mode;
                Ok(Some(entry))
            }
            "dirrm" => Ok(Some(AssetEntry::new(
                AssetKind::DirectoryRm,
                join_cwd(&self.cwd, rest),
            ))),
            "dirrmtry" => Ok(Some(AssetEntry::new(
                AssetKind::DirectoryRmTry,
                join_cwd(&self.cwd, rest),
            ))),
            "shell" => Ok(Some(AssetEntry::new(AssetKind::ShellFile, join_cwd(&self.cwd, rest)))),
            "info" => Ok(Some(AssetEntry::new(AssetKind::Info, rest))),
            "ignore" => {
                self.skip_next = true;
                Ok(Some(AssetEntry::new(AssetKind::Ignore, "")))
            }
            "comment" => Ok(Some(AssetEntry::new(AssetKind::Comment, rest))),
            "option" => Ok(Some(AssetEntry::new(AssetKind::Option, rest))),
            "origin" => Ok(Some(AssetEntry::new(AssetKind::Origin, rest))),
            "depend" => Ok(Some(AssetEntry::new(AssetKind::DepOrigin, rest))),
            "display" => Ok(Some(AssetEntry::new(AssetKind::Display, join_cwd(&self.cwd, rest)))),
            other => Err(BundleError::MalformedDirective(format!("unknown directive @{other}"))),
        }
    }
}

impl<R: BufRead> Iterator for AssetListParser<R> {
    type Item = Result<AssetEntry, BundleError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

fn join_cwd(cwd: &str, path: &str) -> String {
    if path.starts_with('/') || path.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", cwd.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Vec<AssetEntry> {
        AssetListParser::new(Cursor::new(text.as_bytes()), "/usr/local")
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn bare_lines_join_cwd() {
        let entries = parse("@cwd /usr/local/bin\nnvim\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, AssetKind::File);
        assert_eq!(entries[0].data, "/usr/local/bin/nvim");
    }

    #[test]
    fn bare_cwd_restores_prefix() {
        let entries = parse("@cwd /usr/local/bin\nnvim\n@cwd\nshare/doc\n");
        assert_eq!(entries[1].data, "/usr/local/share/doc");
    }

    #[test]
    fn mode_owner_group_apply_to_subsequent_files() {
        let entries = parse("@mode 0644\n@owner root\n@group wheel\nconfig.toml\n");
        assert_eq!(entries[0].mode, Some(0o644));
        assert_eq!(entries[0].owner.as_deref(), Some("root"));
        assert_eq!(entries[0].group.as_deref(), Some("wheel"));
    }

    #[test]
    fn preexec_and_postexec_are_buffered_as_entries() {
        let entries = parse("@preexec echo hi %F\n@postexec echo bye %D\n");
        assert_eq!(entries[0].kind, AssetKind::PreExec);
        assert_eq!(entries[0].data, "echo hi %F");
        assert_eq!(entries[1].kind, AssetKind::PostExec);
    }

    #[test]
    fn sample_with_explicit_destination() {
        let entries = parse("@sample etc/foo.conf.sample etc/foo.conf\n");
        assert_eq!(entries[0].kind, AssetKind::SampleFile);
        assert_eq!(entries[0].data, "/usr/local/etc/foo.conf.sample");
        assert_eq!(entries[0].alt_data.as_deref(), Some("/usr/local/etc/foo.conf"));
    }

    #[test]
    fn sample_without_destination_strips_suffix_later() {
        let entries = parse("@sample etc/foo.conf.sample\n");
        assert_eq!(entries[0].alt_data, None);
    }

    #[test]
    fn dirrm_and_dirrmtry() {
        let entries = parse("@dirrm share/doc/pkg\n@dirrmtry share/doc\n");
        assert_eq!(entries[0].kind, AssetKind::DirectoryRm);
        assert_eq!(entries[1].kind, AssetKind::DirectoryRmTry);
    }

    #[test]
    fn ignore_skips_the_next_bare_line() {
        let entries = parse("@ignore\nshould-not-appear\nkept\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].data, "/usr/local/kept");
    }

    #[test]
    fn unknown_directive_is_malformed() {
        let mut parser = AssetListParser::new(Cursor::new(b"@bogus".as_slice()), "/usr/local");
        assert!(parser.next().unwrap().is_err());
    }
}

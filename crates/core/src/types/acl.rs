use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rights that can be granted to a principal on a file-system object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AccessRights {
    FullControl,
    Modify,
    ReadExecute,
    Read,
    Write,
}

const FILE_GENERIC_READ: u32 = 0x0012_0089;
const FILE_GENERIC_WRITE: u32 = 0x0012_0116;
const FILE_GENERIC_EXECUTE: u32 = 0x0012_00A0;
const FILE_ALL_ACCESS: u32 = 0x001F_01FF;
const DELETE: u32 = 0x0001_0000;

impl AccessRights {
    /// Win32 file access mask for these rights.
    pub fn access_mask(self) -> u32 {
        match self {
            Self::FullControl => FILE_ALL_ACCESS,
            Self::Modify => FILE_GENERIC_READ | FILE_GENERIC_WRITE | FILE_GENERIC_EXECUTE | DELETE,
            Self::ReadExecute => FILE_GENERIC_READ | FILE_GENERIC_EXECUTE,
            Self::Read => FILE_GENERIC_READ,
            Self::Write => FILE_GENERIC_WRITE,
        }
    }

    /// Short form used by `icacls` (`F`, `M`, `RX`, `R`, `W`).
    pub fn short_name(self) -> &'static str {
        match self {
            Self::FullControl => "F",
            Self::Modify => "M",
            Self::ReadExecute => "RX",
            Self::Read => "R",
            Self::Write => "W",
        }
    }
}

impl fmt::Display for AccessRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAclError {
    #[error("unknown access rights '{0}' (expected F, M, RX, R or W)")]
    UnknownRights(String),
    #[error("ACL entry '{0}' must have the form principal:RIGHTS")]
    MissingSeparator(String),
    #[error("ACL entry '{0}' has an empty principal")]
    EmptyPrincipal(String),
}

impl FromStr for AccessRights {
    type Err = ParseAclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        match trimmed.to_ascii_lowercase().as_str() {
            "f" | "full" | "fullcontrol" => Ok(Self::FullControl),
            "m" | "modify" => Ok(Self::Modify),
            "rx" | "readexecute" => Ok(Self::ReadExecute),
            "r" | "read" => Ok(Self::Read),
            "w" | "write" => Ok(Self::Write),
            _ => Err(ParseAclError::UnknownRights(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AclEntry {
    pub principal: String,
    pub rights: AccessRights,
}

impl AclEntry {
    pub fn new(principal: impl Into<String>, rights: AccessRights) -> Self {
        Self { principal: principal.into(), rights }
    }

    pub fn principal_matches(&self, principal: &str) -> bool {
        principal_key(&self.principal) == principal_key(principal)
    }
}

impl fmt::Display for AclEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:({})", self.principal, self.rights)
    }
}

impl FromStr for AclEntry {
    type Err = ParseAclError;

    /// Parses `principal:RIGHTS`; the rights may be wrapped in parentheses.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (principal, rights) =
            s.rsplit_once(':').ok_or_else(|| ParseAclError::MissingSeparator(s.to_owned()))?;
        let principal = principal.trim();
        if principal.is_empty() {
            return Err(ParseAclError::EmptyPrincipal(s.to_owned()));
        }
        Ok(Self::new(principal, rights.parse()?))
    }
}

/// Ordered grants applied to exactly one path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AclSpecification {
    entries: Vec<AclEntry>,
}

impl AclSpecification {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn grant(mut self, principal: impl Into<String>, rights: AccessRights) -> Self {
        self.entries.push(AclEntry::new(principal, rights));
        self
    }

    pub fn push(&mut self, entry: AclEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One entry per principal (case-insensitive). The last entry supplied for
    /// a principal wins and takes the position of that last occurrence.
    pub fn normalized(&self) -> Vec<AclEntry> {
        let mut seen = HashSet::new();
        let mut kept: Vec<AclEntry> = self
            .entries
            .iter()
            .rev()
            .filter(|entry| seen.insert(principal_key(&entry.principal)))
            .cloned()
            .collect();
        kept.reverse();
        kept
    }
}

impl FromIterator<AclEntry> for AclSpecification {
    fn from_iter<I: IntoIterator<Item = AclEntry>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

fn principal_key(principal: &str) -> String {
    principal.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("F", AccessRights::FullControl)]
    #[case("(RX)", AccessRights::ReadExecute)]
    #[case("modify", AccessRights::Modify)]
    #[case(" r ", AccessRights::Read)]
    #[case("W", AccessRights::Write)]
    fn rights_parse_from_short_and_long_names(#[case] text: &str, #[case] expected: AccessRights) {
        assert_eq!(text.parse::<AccessRights>().unwrap(), expected);
    }

    #[rstest]
    fn unknown_rights_are_rejected() {
        assert_eq!("X".parse::<AccessRights>(), Err(ParseAclError::UnknownRights("X".into())));
    }

    #[rstest]
    fn entry_parses_domain_principal() {
        let entry: AclEntry = r"NT AUTHORITY\SYSTEM:(F)".parse().unwrap();
        assert_eq!(entry.principal, r"NT AUTHORITY\SYSTEM");
        assert_eq!(entry.rights, AccessRights::FullControl);
        assert_eq!(entry.to_string(), r"NT AUTHORITY\SYSTEM:(F)");
    }

    #[rstest]
    #[case("Users", ParseAclError::MissingSeparator("Users".into()))]
    #[case(" :R", ParseAclError::EmptyPrincipal(" :R".into()))]
    fn malformed_entries_are_rejected(#[case] text: &str, #[case] expected: ParseAclError) {
        assert_eq!(text.parse::<AclEntry>(), Err(expected));
    }

    #[rstest]
    fn normalization_keeps_last_entry_per_principal() {
        let spec = AclSpecification::new()
            .grant("Users", AccessRights::Read)
            .grant("Administrators", AccessRights::FullControl)
            .grant("USERS", AccessRights::Modify);

        let normalized = spec.normalized();
        assert_eq!(
            normalized,
            vec![
                AclEntry::new("Administrators", AccessRights::FullControl),
                AclEntry::new("USERS", AccessRights::Modify),
            ]
        );
    }

    #[rstest]
    fn normalization_of_distinct_principals_keeps_order() {
        let spec: AclSpecification =
            [AclEntry::new("a", AccessRights::Read), AclEntry::new("b", AccessRights::Write)]
                .into_iter()
                .collect();
        assert_eq!(spec.normalized(), spec.entries());
    }

    #[rstest]
    fn modify_includes_delete_but_not_full_control() {
        let modify = AccessRights::Modify.access_mask();
        assert_ne!(modify & DELETE, 0);
        assert_ne!(modify, AccessRights::FullControl.access_mask());
        assert_eq!(AccessRights::ReadExecute.access_mask() & FILE_GENERIC_READ, FILE_GENERIC_READ);
    }
}

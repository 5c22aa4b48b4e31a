// src/stdlib/intrinsic.rs

use std::fmt;

/// Closed registry of in-process commands.
///
/// Command names match exactly (case-sensitive), so `print` still goes to
/// the external program while `Print` never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Print,
    Println,
    Error,
    Errorln,
    ReadFile,
    WriteFile,
    ListFiles,
    FileExists,
    Contains,
    Replace,
    ToUpper,
    ToLower,
    Trim,
    GetEnv,
    SetEnv,
    WorkingDir,
    ChangeDir,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 17] = [
        Intrinsic::Print,
        Intrinsic::Println,
        Intrinsic::Error,
        Intrinsic::Errorln,
        Intrinsic::ReadFile,
        Intrinsic::WriteFile,
        Intrinsic::ListFiles,
        Intrinsic::FileExists,
        Intrinsic::Contains,
        Intrinsic::Replace,
        Intrinsic::ToUpper,
        Intrinsic::ToLower,
        Intrinsic::Trim,
        Intrinsic::GetEnv,
        Intrinsic::SetEnv,
        Intrinsic::WorkingDir,
        Intrinsic::ChangeDir,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Print => "Print",
            Intrinsic::Println => "Println",
            Intrinsic::Error => "Error",
            Intrinsic::Errorln => "Errorln",
            Intrinsic::ReadFile => "ReadFile",
            Intrinsic::WriteFile => "WriteFile",
            Intrinsic::ListFiles => "ListFiles",
            Intrinsic::FileExists => "FileExists",
            Intrinsic::Contains => "Contains",
            Intrinsic::Replace => "Replace",
            Intrinsic::ToUpper => "ToUpper",
            Intrinsic::ToLower => "ToLower",
            Intrinsic::Trim => "Trim",
            Intrinsic::GetEnv => "GetEnv",
            Intrinsic::SetEnv => "SetEnv",
            Intrinsic::WorkingDir => "WorkingDir",
            Intrinsic::ChangeDir => "ChangeDir",
        }
    }
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_round_trips() {
        for intrinsic in Intrinsic::ALL {
            assert_eq!(Intrinsic::from_name(intrinsic.name()), Some(intrinsic));
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(Intrinsic::from_name("print"), None);
        assert_eq!(Intrinsic::from_name("echo"), None);
    }
}

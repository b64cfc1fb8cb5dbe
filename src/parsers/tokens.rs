//! Splitting of compound package tokens into their parts.

/// Architectures rpm/apk print as a suffix. Anything else after the last dot
/// is part of the name or release.
const KNOWN_ARCHES: &[&str] = &[
    "x86_64", "noarch", "i686", "i586", "i386", "aarch64", "armv7hl", "armhfp", "armv7", "armhf",
    "ppc64le", "ppc64", "s390x", "riscv64", "src", "x86", "loongarch64",
];

pub fn is_known_arch(s: &str) -> bool {
    KNOWN_ARCHES.contains(&s)
}

/// `libssl3:amd64` -> (`libssl3`, `amd64`). Names without a qualifier get an
/// empty architecture.
pub fn split_name_arch(token: &str) -> (&str, &str) {
    match token.rsplit_once(':') {
        Some((name, arch)) if !name.is_empty() && !arch.is_empty() => (name, arch),
        _ => (token, ""),
    }
}

/// `vim/jammy-updates,jammy-security,now` -> (`vim`, `jammy-updates`).
/// The first listed suite is the category; the rest are aliases.
pub fn split_name_suite(token: &str) -> (&str, &str) {
    match token.split_once('/') {
        Some((name, suites)) => (name, suites.split(',').next().unwrap_or_default()),
        None => (token, ""),
    }
}

/// An rpm package spelled out as name-[epoch:]version-release.arch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nevra<'a> {
    pub name: &'a str,
    /// `[epoch:]version-release`
    pub version: &'a str,
    pub arch: &'a str,
}

/// Split an rpm NEVRA token such as `vim-enhanced-2:8.2.2637-20.el9_1.x86_64`.
pub fn split_nevra(token: &str) -> Option<Nevra<'_>> {
    let (rest, arch) = match token.rsplit_once('.') {
        Some((rest, arch)) if is_known_arch(arch) => (rest, arch),
        _ => (token, ""),
    };
    let (name_version, _release) = rest.rsplit_once('-')?;
    let (name, _version) = name_version.rsplit_once('-')?;
    if name.is_empty() {
        return None;
    }
    Some(Nevra {
        name,
        version: &rest[name.len() + 1..],
        arch,
    })
}

/// Split an apk `name-version-rN` token such as `py3-pip-23.3.1-r0`.
///
/// apk names may contain dashes and digits, so the version is the last two
/// dash-separated segments where the final one is `rN`.
pub fn split_apk_name(token: &str) -> Option<(&str, &str)> {
    let (name_version, release) = token.rsplit_once('-')?;
    let is_release = release
        .strip_prefix('r')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
    if !is_release {
        return None;
    }
    let (name, version) = name_version.rsplit_once('-')?;
    if name.is_empty() || !version.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((name, &token[name.len() + 1..]))
}

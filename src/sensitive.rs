// OpenSpace Hub - Sensitive-File Classifier
//
// Pattern-matches a path against the credentials/keys/secrets denylist
// that agents must never touch. Pure function, case-insensitive. False
// negatives here are a security hole; the "secret-santa" false-positive
// exclusion is a regression-tested requirement.

/// SSH private key basenames (and their `.pub`/`.old` variants).
const SSH_KEY_BASENAMES: &[&str] = &["id_rsa", "id_ed25519", "id_ecdsa", "id_dsa"];

/// Exact sensitive basenames.
const SENSITIVE_BASENAMES: &[&str] = &[
    ".htpasswd",
    "credentials.json",
    "service-account.json",
    "azure.json",
    "secrets.yml",
    "secrets.yaml",
    "secrets.config",
    "master.key",
    "database.yml",
];

/// Sensitive file extensions.
const SENSITIVE_SUFFIXES: &[&str] = &[".pem", ".key", ".cert"];

/// Directory segments that mark everything beneath them sensitive.
const SENSITIVE_DIRS: &[&str] = &[".git", "git", ".ssh", ".aws", "secrets", ".secrets"];

/// Returns true when the path must be hidden from agents.
///
/// Matching anchors on path-separator and extension boundaries, never
/// bare substrings — "secret-santa.ts" and "secretariat" stay readable.
pub fn is_sensitive(path: &str) -> bool {
    let lower = path.to_lowercase().replace('\\', "/");
    let segments: Vec<&str> = lower.split('/').filter(|s| !s.is_empty()).collect();
    let base = segments.last().copied().unwrap_or("");

    // Dotenv files and suffixed variants (.env, .env.local, .env.production).
    if base == ".env" || base.starts_with(".env.") {
        return true;
    }

    // SSH key basenames, with or without a suffix (id_rsa.pub, id_rsa.old).
    for key in SSH_KEY_BASENAMES {
        if base == *key || base.starts_with(&format!("{key}.")) {
            return true;
        }
    }

    if SENSITIVE_BASENAMES.contains(&base) {
        return true;
    }

    if SENSITIVE_SUFFIXES.iter().any(|ext| base.ends_with(ext)) {
        return true;
    }

    // Cloud-credential name fragments that only appear in generated files.
    if base.contains("firebase-adminsdk") || base.contains("gcloud") {
        return true;
    }

    // Directory patterns: any segment match, plus a bare "secrets" file
    // (with any extension) at the leaf.
    for seg in &segments {
        if SENSITIVE_DIRS.contains(seg) {
            return true;
        }
    }
    let stem = base.split_once('.').map_or(base, |(s, _)| s);
    if stem == "secrets" || base.starts_with(".secrets") {
        return true;
    }

    false
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_variants() {
        assert!(is_sensitive(".env"));
        assert!(is_sensitive(".env.local"));
        assert!(is_sensitive("app/.env.production"));
        assert!(is_sensitive(".ENV"));
        assert!(!is_sensitive("environment.ts"));
    }

    #[test]
    fn ssh_keys() {
        assert!(is_sensitive("id_rsa"));
        assert!(is_sensitive("id_rsa.pub"));
        assert!(is_sensitive("id_ed25519"));
        assert!(is_sensitive("home/.ssh/config"));
        assert!(!is_sensitive("rapid_rsa_notes.md"));
    }

    #[test]
    fn vcs_internals() {
        assert!(is_sensitive(".git/config"));
        assert!(is_sensitive("repo/.git/HEAD"));
        assert!(is_sensitive("git/objects/ab"));
        assert!(!is_sensitive("github-actions.yml"));
        assert!(!is_sensitive("gitignore-helper.ts"));
    }

    #[test]
    fn key_material_suffixes() {
        assert!(is_sensitive("server.pem"));
        assert!(is_sensitive("tls/server.key"));
        assert!(is_sensitive("ca.cert"));
        assert!(is_sensitive(".htpasswd"));
        assert!(!is_sensitive("keyboard.ts"));
        assert!(!is_sensitive("monkey.txt"));
    }

    #[test]
    fn cloud_credentials() {
        assert!(is_sensitive("credentials.json"));
        assert!(is_sensitive("config/service-account.json"));
        assert!(is_sensitive(".aws/config"));
        assert!(is_sensitive("azure.json"));
        assert!(is_sensitive("gcloud-auth.json"));
        assert!(is_sensitive("myapp-firebase-adminsdk-x1y2.json"));
    }

    #[test]
    fn secret_configuration() {
        assert!(is_sensitive("secrets.yml"));
        assert!(is_sensitive("config/secrets.yaml"));
        assert!(is_sensitive("rails/master.key"));
        assert!(is_sensitive("config/database.yml"));
        assert!(is_sensitive("secrets/token.txt"));
        assert!(is_sensitive(".secrets"));
        assert!(is_sensitive("secrets.json"));
    }

    #[test]
    fn secret_substring_false_positives_excluded() {
        // Regression: anchoring must be on separator/extension boundaries.
        assert!(!is_sensitive("secret-santa.ts"));
        assert!(!is_sensitive("secretariat"));
        assert!(!is_sensitive("src/secret-santa/draw.ts"));
        assert!(!is_sensitive("the-secretary.md"));
    }

    #[test]
    fn ordinary_files_pass() {
        assert!(!is_sensitive("README.md"));
        assert!(!is_sensitive("src/main.rs"));
        assert!(!is_sensitive("package.json"));
    }
}

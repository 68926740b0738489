use rand::{distributions::Alphanumeric, Rng};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Length of a per-runtime secret.
const RUNTIME_SECRET_LENGTH: usize = 32;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Generates a random token used to authorize calls into a single runtime.
pub fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RUNTIME_SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// Generates a random hostname for a runtime container.
pub fn generate_hostname() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Generates a unique file name for a build artifact with the given extension.
pub fn generate_artifact_name(extension: &str) -> String {
    format!("{}.{}", uuid::Uuid::new_v4().simple(), extension)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

//! Command lines for the compiler and the bundler

use crate::config::BuildConfig;

/// Compiler arguments: `-f` per foreign pattern, output and require path, then the source patterns
pub fn compiler_args(config: &BuildConfig) -> Vec<String> {
    let mut args: Vec<String> = config
        .ffi
        .iter()
        .flat_map(|pattern| ["-f".to_string(), pattern.clone()])
        .collect();

    args.extend([
        "-o".to_string(),
        config.output.display().to_string(),
        "-r".to_string(),
        config.require_path.clone(),
    ]);
    args.extend(config.src.iter().cloned());
    args
}

/// Bundler arguments: `-m` per entry module, namespace and require path, then the compiled artifacts
pub fn bundler_args(config: &BuildConfig, entry_modules: &[String]) -> Vec<String> {
    let mut args: Vec<String> = entry_modules
        .iter()
        .flat_map(|module| ["-m".to_string(), module.clone()])
        .collect();

    args.extend([
        "-n".to_string(),
        config.bundle_namespace.clone(),
        "-r".to_string(),
        config.require_path.clone(),
    ]);
    args.extend(config.compiled_artifact_patterns());
    args
}

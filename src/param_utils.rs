use std::collections::HashMap;

/// Extract a parameter as f64 with a default value, ignoring non-finite input
pub fn get_param_f64(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .copied()
        .filter(|value| value.is_finite())
        .unwrap_or(default)
}

/// Extract a parameter as a rounded usize, never below `min`
pub fn get_param_usize_at_least(
    params: &HashMap<String, f64>,
    key: &str,
    default: usize,
    min: usize,
) -> usize {
    let raw = get_param_f64(params, key, default as f64);
    raw.round().max(min as f64) as usize
}

/// Extract a share quantity; at least one share
pub fn get_param_quantity(params: &HashMap<String, f64>, key: &str, default: u64) -> u64 {
    let raw = get_param_f64(params, key, default as f64);
    raw.floor().max(1.0) as u64
}

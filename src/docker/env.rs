#![allow(clippy::module_name_repetitions)]
//! `-e` argument helpers.

pub(crate) fn push_env(args: &mut Vec<String>, entry: &str) {
    args.push("-e".to_string());
    args.push(entry.to_string());
}

pub(crate) fn push_env_kv(args: &mut Vec<String>, key: &str, val: &str) {
    push_env(args, &format!("{key}={val}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_env_kv() {
        let mut args = Vec::new();
        push_env_kv(&mut args, "HOME", "/home/dev");
        push_env(&mut args, "A=1");
        assert_eq!(args, vec!["-e", "HOME=/home/dev", "-e", "A=1"]);
    }
}

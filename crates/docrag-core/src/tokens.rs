//! Token estimate used for context budgets.
//!
//! `ceil(words * 4 / 3)` over whitespace-separated words, i.e. roughly 0.75
//! words per token. Joining texts with whitespace never raises the estimate
//! above the sum of the parts.

pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words * 4).div_ceil(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_round_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("one"), 2);
        assert_eq!(estimate_tokens("one two three"), 4);
        assert_eq!(estimate_tokens("  spaced\n\nout\twords "), 4);
    }

    #[test]
    fn joined_estimate_never_exceeds_sum_of_parts() {
        let parts = ["alpha beta", "gamma", "delta epsilon zeta eta", "theta"];
        let sum: usize = parts.iter().map(|p| estimate_tokens(p)).sum();
        assert!(estimate_tokens(&parts.join("\n\n")) <= sum);
    }
}

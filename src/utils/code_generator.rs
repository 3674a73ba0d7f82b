use rand::Rng;
use rand::distributions::Alphanumeric;

/// 生成指定长度的字母数字兑换码 (a-z A-Z 0-9)
///
/// 唯一性由台账的唯一索引兜底，冲突时由调用方重新生成。
pub fn generate_redeem_code(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_redeem_code_shape() {
        let code = generate_redeem_code(8);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_redeem_code_rarely_collides() {
        let codes: HashSet<String> = (0..1000).map(|_| generate_redeem_code(10)).collect();
        // 62^10 空间内 1000 个样本碰撞概率可忽略
        assert_eq!(codes.len(), 1000);
    }
}

//! 公共工具模块

/// 按字符（Unicode 码点）截断字符串，直接取前缀，不添加省略号
///
/// 返回不超过 `max_chars` 个字符的前缀切片
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// 四舍五入到指定小数位
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

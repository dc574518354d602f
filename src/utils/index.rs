use std::time::Duration;

/// Number of decimal places in a displayed coin amount.
pub const COIN_DECIMALS: u32 = 8;

pub fn format_token_amount(amount: u64, decimals: u32) -> String {
	if decimals == 0 {
		return amount.to_string();
	}
	let scale = 10u64.pow(decimals);
	format!(
		"{}.{:0width$}",
		amount / scale,
		amount % scale,
		width = decimals as usize
	)
}

/// Blocks per second over `elapsed`, scaled down to per-minute when slow.
pub fn format_rate(blocks: u64, elapsed: Duration) -> String {
	let secs = elapsed.as_secs_f64();
	if secs <= 0.0 {
		return format!("{} blocks", blocks);
	}

	let per_second = blocks as f64 / secs;
	if per_second < 1.0 {
		format!("{:.2} blocks/min", per_second * 60.0)
	} else {
		format!("{:.2} blocks/sec", per_second)
	}
}

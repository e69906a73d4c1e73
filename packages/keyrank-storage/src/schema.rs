const INIT_SQL: &str = include_str!("../../../sql/init.sql");
/// Files `init.sql` may pull in with `\ir`, keyed by their path relative to `sql/`.
const INCLUDES: [(&str, &str); 1] = [(
	"tables/001_ranking_snapshots.sql",
	include_str!("../../../sql/tables/001_ranking_snapshots.sql"),
)];

/// `init.sql` with every `\ir` line replaced by the included file.
pub fn render_schema() -> String {
	let mut out = String::with_capacity(INIT_SQL.len());

	for line in INIT_SQL.lines() {
		let included = line
			.trim()
			.strip_prefix("\\ir ")
			.and_then(|path| INCLUDES.iter().find(|(name, _)| *name == path.trim()))
			.map(|(_, sql)| *sql);

		out.push_str(included.unwrap_or(line));
		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn includes_are_expanded() {
		let sql = render_schema();

		assert!(!sql.contains("\\ir "));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS ranking_snapshots"));
		assert!(sql.contains("UNIQUE (app_id, combo_text, market, platform)"));
	}
}

//! Date patterns in the search backend's notation (`yyyy-MM-dd'T'HH:mm:ss`).
//!
//! Patterns are translated to `time` format descriptions so free-form terms can be checked
//! before they are sent to the backend. A pattern may list alternatives separated by `||`.

use time::{Date, format_description, parsing::Parsed};

const NAMED_FORMATS: [(&str, &str); 8] = [
	("date", "yyyy-MM-dd"),
	("strict_date", "yyyy-MM-dd"),
	("basic_date", "yyyyMMdd"),
	("date_hour_minute_second", "yyyy-MM-dd'T'HH:mm:ss"),
	("strict_date_hour_minute_second", "yyyy-MM-dd'T'HH:mm:ss"),
	("year_month_day", "yyyy-MM-dd"),
	("year_month", "yyyy-MM"),
	("year", "yyyy"),
];

/// Returns `true` when `text` parses completely under any alternative of `pattern`.
pub fn matches(pattern: &str, text: &str) -> bool {
	pattern.split("||").map(str::trim).filter(|alt| !alt.is_empty()).any(|alt| {
		match alt {
			"epoch_millis" | "epoch_second" => is_epoch(text),
			"date_optional_time" | "strict_date_optional_time" => {
				["yyyy-MM-dd", "yyyy-MM-dd'T'HH:mm:ss", "yyyy-MM-dd'T'HH:mm:ss.SSS"]
					.iter()
					.any(|candidate| matches_single(candidate, text))
			},
			_ => {
				let resolved = NAMED_FORMATS
					.iter()
					.find(|(name, _)| *name == alt)
					.map(|(_, pattern)| *pattern)
					.unwrap_or(alt);

				matches_single(resolved, text)
			},
		}
	})
}

/// Checks that `pattern` is a well-formed date pattern.
pub fn is_valid(pattern: &str) -> bool {
	pattern.split("||").map(str::trim).all(|alt| {
		!alt.is_empty()
			&& (matches!(
				alt,
				"epoch_millis"
					| "epoch_second"
					| "date_optional_time"
					| "strict_date_optional_time"
			) || NAMED_FORMATS.iter().any(|(name, _)| *name == alt)
				|| translate(alt).is_some())
	})
}

fn matches_single(pattern: &str, text: &str) -> bool {
	let Some(description) = translate(pattern) else {
		return false;
	};
	let Ok(items) = format_description::parse(&description) else {
		return false;
	};
	let mut parsed = Parsed::new();
	let Ok(remaining) = parsed.parse_items(text.as_bytes(), &items) else {
		return false;
	};

	if !remaining.is_empty() {
		return false;
	}

	// Component parsing checks ranges only; reject impossible calendar dates.
	match (parsed.year(), parsed.month(), parsed.day()) {
		(Some(year), Some(month), Some(day)) => {
			Date::from_calendar_date(year, month, day.get()).is_ok()
		},
		_ => true,
	}
}

fn is_epoch(text: &str) -> bool {
	let digits = text.strip_prefix('-').unwrap_or(text);

	!digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

/// Translates one pattern into a `time` format description string.
fn translate(pattern: &str) -> Option<String> {
	let chars: Vec<char> = pattern.chars().collect();
	let mut out = String::with_capacity(pattern.len() * 2);
	let mut idx = 0;

	while idx < chars.len() {
		let ch = chars[idx];

		if ch == '\'' {
			let end = chars[idx + 1..].iter().position(|c| *c == '\'')? + idx + 1;

			if end == idx + 1 {
				out.push('\'');
			} else {
				for literal in &chars[idx + 1..end] {
					push_literal(&mut out, *literal);
				}
			}

			idx = end + 1;

			continue;
		}
		if !ch.is_ascii_alphabetic() {
			push_literal(&mut out, ch);

			idx += 1;

			continue;
		}

		let run = chars[idx..].iter().take_while(|c| **c == ch).count();
		let component = match (ch, run) {
			('y' | 'u', 2) => "[year repr:last_two]",
			('y' | 'u', _) => "[year]",
			('M', 1) => "[month padding:none]",
			('M', 2) => "[month]",
			('M', 3) => "[month repr:short]",
			('M', _) => "[month repr:long]",
			('d', 1) => "[day padding:none]",
			('d', 2) => "[day]",
			('D', _) => "[ordinal]",
			('H', 1) => "[hour padding:none]",
			('H', 2) => "[hour]",
			('h', 1) => "[hour repr:12 padding:none]",
			('h', 2) => "[hour repr:12]",
			('m', 2) => "[minute]",
			('s', 2) => "[second]",
			('S', 1) => "[subsecond digits:1]",
			('S', 2) => "[subsecond digits:2]",
			('S', 3) => "[subsecond digits:3]",
			('S', 6) => "[subsecond digits:6]",
			('S', 9) => "[subsecond digits:9]",
			('a', 1) => "[period]",
			('E', 1..=3) => "[weekday repr:short]",
			('E', _) => "[weekday]",
			('Z' | 'X' | 'x', 1 | 2) => "[offset_hour sign:mandatory][offset_minute]",
			('X' | 'x', 3) => "[offset_hour sign:mandatory]:[offset_minute]",
			_ => return None,
		};

		out.push_str(component);

		idx += run;
	}

	Some(out)
}

fn push_literal(out: &mut String, ch: char) {
	if ch == '[' {
		out.push_str("[[");
	} else {
		out.push(ch);
	}
}

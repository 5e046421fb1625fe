//! Template resolution for announcement messages.
//!
//! Substitutes `{identifier}` placeholders with values derived from a timer's
//! current state. Unknown identifiers are left literally in place so templates
//! written for a newer release keep working. Pure and infallible: missing
//! timer fields degrade to empty strings.

use crate::timer::TimerInfo;

/// Replace every recognized `{identifier}` in `template` with its value.
pub fn resolve_template(template: &str, timer: &TimerInfo) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_identifier(&after[..close]) => {
                let key = &after[..close];
                match resolve_identifier(key, timer) {
                    Some(value) => out.push_str(&value),
                    None => {
                        // Unknown identifier: keep the placeholder verbatim.
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn resolve_identifier(key: &str, timer: &TimerInfo) -> Option<String> {
    let remaining_minutes = timer.remaining_seconds / 60;
    let value = match key {
        "program" => timer
            .program
            .clone()
            .unwrap_or_else(|| timer.label.clone()),
        "courseCode" => timer.course_code.clone().unwrap_or_default(),
        "label" => timer.label.clone(),
        "remainingMinutes" => remaining_minutes.to_string(),
        "remainingSeconds" => timer.remaining_seconds.to_string(),
        "remainingWords" => minutes_in_words(remaining_minutes),
        "elapsedMinutes" => (timer.elapsed_seconds() / 60).to_string(),
        "totalMinutes" => (timer.duration_seconds / 60).to_string(),
        "studentCount" => timer
            .student_count
            .map(|n| n.to_string())
            .unwrap_or_default(),
        _ => return None,
    };
    Some(value)
}

/// Spoken form for the minute counts that actually appear in schedules.
/// Anything else falls back to the numeral so speech stays intelligible.
fn minutes_in_words(minutes: u64) -> String {
    let words = match minutes {
        1 => "one minute",
        2 => "two minutes",
        3 => "three minutes",
        4 => "four minutes",
        5 => "five minutes",
        6 => "six minutes",
        7 => "seven minutes",
        8 => "eight minutes",
        9 => "nine minutes",
        10 => "ten minutes",
        15 => "fifteen minutes",
        20 => "twenty minutes",
        30 => "thirty minutes",
        45 => "forty-five minutes",
        60 => "sixty minutes",
        other => return format!("{} minutes", other),
    };
    words.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerInfo;

    fn exam_timer() -> TimerInfo {
        let mut timer = TimerInfo::new("t1", "GEO101 · BSc Geomatics", 7200)
            .with_exam_fields("GEO101", "BSc Geomatics", 42);
        timer.remaining_seconds = 300;
        timer
    }

    #[test]
    fn resolves_program_and_remaining_words() {
        let timer = exam_timer();
        let out = resolve_template("{program}, {remainingWords} left", &timer);
        assert_eq!(out, "BSc Geomatics, five minutes left");
    }

    #[test]
    fn resolves_numeric_identifiers() {
        let mut timer = exam_timer();
        timer.remaining_seconds = 605;
        let out = resolve_template(
            "{remainingMinutes}m / {remainingSeconds}s, elapsed {elapsedMinutes} of {totalMinutes}",
            &timer,
        );
        assert_eq!(out, "10m / 605s, elapsed 109 of 120");
    }

    #[test]
    fn unknown_identifiers_stay_literal() {
        let timer = exam_timer();
        let out = resolve_template("{program} {roomNumber}", &timer);
        assert_eq!(out, "BSc Geomatics {roomNumber}");
    }

    #[test]
    fn missing_exam_fields_degrade_gracefully() {
        let mut timer = TimerInfo::new("t2", "Pop quiz", 600);
        timer.remaining_seconds = 60;
        assert_eq!(resolve_template("{program}", &timer), "Pop quiz");
        assert_eq!(resolve_template("{courseCode}", &timer), "");
        assert_eq!(resolve_template("{studentCount}", &timer), "");
    }

    #[test]
    fn word_table_falls_back_to_numerals() {
        let mut timer = exam_timer();
        timer.remaining_seconds = 12 * 60;
        assert_eq!(resolve_template("{remainingWords}", &timer), "12 minutes");
        timer.remaining_seconds = 59;
        assert_eq!(resolve_template("{remainingWords}", &timer), "0 minutes");
    }

    #[test]
    fn unbalanced_braces_pass_through() {
        let timer = exam_timer();
        assert_eq!(resolve_template("{program", &timer), "{program");
        assert_eq!(resolve_template("a { b } c", &timer), "a { b } c");
    }
}

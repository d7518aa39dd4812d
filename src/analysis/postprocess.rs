/// Boilerplate lead-ins the model tends to put before the medication list.
const COMMON_PREFIXES: [&str; 4] = [
    "Here are the medications:",
    "Medications found:",
    "The medications are:",
    "Medications:",
];

/// Raw responses containing one of these are shown to the user unmodified;
/// they signal a non-prescription image rather than a medication list.
const PASSTHROUGH_MARKERS: [&str; 3] = [
    "no medications found",
    "not a medical document",
    "describe the main objects",
];

/// Turns the raw model response into the text shown to the user.
///
/// Strips one leading boilerplate prefix, splits on commas and title-cases
/// each medication name. Responses that signal a non-prescription image pass
/// through unchanged, and anything that yields no tokens falls back to the
/// raw response verbatim.
pub fn format_medication_report(raw: &str) -> String {
    let raw = raw.trim();
    let lowered = raw.to_lowercase();
    if PASSTHROUGH_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        return raw.to_string();
    }

    let mut cleaned = raw;
    for prefix in COMMON_PREFIXES {
        if let Some(head) = cleaned.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                cleaned = cleaned[prefix.len()..].trim_start();
                break;
            }
        }
    }

    let medications: Vec<String> = cleaned
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(title_case)
        .collect();

    if medications.is_empty() {
        raw.to_string()
    } else {
        format!("Identified Medications:\n{}", medications.join("\n"))
    }
}

/// Uppercases the first letter of each word, lowercases the rest.
fn title_case(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut at_word_start = true;
    for ch in token.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_and_title_cases_each_name() {
        assert_eq!(
            format_medication_report("Medications: Amoxicillin, ibuprofen"),
            "Identified Medications:\nAmoxicillin\nIbuprofen"
        );
    }

    #[test]
    fn no_medications_response_passes_through() {
        assert_eq!(
            format_medication_report("No medications found"),
            "No medications found"
        );
    }

    #[test]
    fn non_prescription_description_passes_through() {
        let raw = "This is not a medical document; it shows a grocery list.";
        assert_eq!(format_medication_report(raw), raw);
    }

    #[test]
    fn prefix_match_is_case_insensitive() {
        assert_eq!(
            format_medication_report("medications: lisinopril"),
            "Identified Medications:\nLisinopril"
        );
    }

    #[test]
    fn plain_list_without_prefix_is_split() {
        assert_eq!(
            format_medication_report("Amoxicillin, Ibuprofen, Lisinopril"),
            "Identified Medications:\nAmoxicillin\nIbuprofen\nLisinopril"
        );
    }

    #[test]
    fn empty_tokens_are_dropped() {
        assert_eq!(
            format_medication_report("Medications: Amoxicillin, , ,"),
            "Identified Medications:\nAmoxicillin"
        );
    }

    #[test]
    fn unsplittable_response_falls_back_to_raw_text() {
        assert_eq!(format_medication_report("Medications: ,,,"), "Medications: ,,,");
    }

    #[test]
    fn title_case_handles_hyphenated_names() {
        assert_eq!(title_case("co-amoxiclav 500MG"), "Co-Amoxiclav 500Mg");
    }
}

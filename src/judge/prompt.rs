use super::CaseDetails;

pub const SYSTEM_INSTRUCTION: &str = "You are the Cat Judge: gentle, fair and good at emotional \
communication. You help couples understand a quarrel and who is responsible for what, reasoning \
calmly while showing empathy, and you suggest concrete ways to make up. Your tone is warm but not \
syrupy, and a little bit cute.";

/// The seven-part mediation request for one case.
pub fn build_prompt(case: &CaseDetails) -> String {
    let him = &case.male_name;
    let her = &case.female_name;

    format!(
        "Please mediate based on what both parties wrote below.

Input:
[{him}]
What happened: {male_story}
Hurt feelings: {male_feelings}

[{her}]
What happened: {female_story}
Hurt feelings: {female_feelings}

Answer strictly in these 7 parts, in order, using Markdown with bold headings:

1. **Case summary** (2-3 objective sentences on roughly what happened)
2. **{him}'s position** (a neutral summary of his main points and feelings)
3. **{her}'s position** (same as above)
4. **Core of the conflict** (the real issue, e.g. how they communicate, mismatched expectations, feelings that went unseen)
5. **Responsibility** (gently, using \"mainly / partly / shared\" rather than absolutes; do not escalate, e.g. \"this time A carries a bit more of the responsibility, but B could also do better at ...\")
6. **Making up**
   - 2-3 concrete suggestions for {him} (how to say it, how to apologise, how to comfort)
   - 2-3 concrete suggestions for {her} (same as above)
7. **The cat's closing words** (one short, gentle line, like \"remember, you two are on the same team, not opponents, meow~\")
",
        male_story = case.male_story,
        male_feelings = case.male_feelings,
        female_story = case.female_story,
        female_feelings = case.female_feelings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_both_sides_and_names() {
        let case = CaseDetails {
            male_name: "Mochi".into(),
            female_name: "Her".into(),
            male_story: "I was too tired to wash up".into(),
            male_feelings: "nobody sees how tired I am".into(),
            female_story: "we agreed he'd do the dishes".into(),
            female_feelings: "promises don't count".into(),
        };

        let prompt = build_prompt(&case);

        assert!(prompt.contains("[Mochi]\nWhat happened: I was too tired to wash up"));
        assert!(prompt.contains("[Her]\nWhat happened: we agreed he'd do the dishes"));
        assert!(prompt.contains("Hurt feelings: promises don't count"));
        assert!(prompt.contains("2. **Mochi's position**"));
        assert!(prompt.contains("7. **The cat's closing words**"));
    }
}

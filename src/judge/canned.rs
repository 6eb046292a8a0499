use async_trait::async_trait;

use super::{CaseDetails, JudgmentService};

/// Fixed sample verdict, used when no Gemini key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedJudge;

#[async_trait]
impl JudgmentService for CannedJudge {
    async fn judge(&self, case: &CaseDetails) -> anyhow::Result<String> {
        let him = &case.male_name;
        let her = &case.female_name;

        Ok(format!(
            "**1. Case summary**
Meow~ it looks like a small thing, whose turn it was to wash the dishes, turned into a quarrel. \
{him} was worn out after work, {her} felt an agreement should be kept, and both dug in.

**2. {him}'s position**
{him} mostly feels exhausted and wanted to rest after a long day. It was not laziness, just a wish \
to shift the chores a little, and it hurt that the tiredness went unnoticed.

**3. {her}'s position**
{her} mostly feels let down. It is not about the dishes but about keeping a promise, and being \
brushed off made it feel like the home didn't matter.

**4. Core of the conflict**
Mismatched expectations and how feelings were expressed. One side values the agreement, the \
other values how they feel right now, and neither saw the other's feelings (tired / disappointed) \
before arguing about the task.

**5. Responsibility**
Shared, meow. {him} broke the agreement first and may have been curt about it, so carries a bit \
more of it; {her} held tightly to the rule just when {him} said he was exhausted. Neither is a \
matter of principle, just two people learning each other.

**6. Making up**
*   **For {him}:** give a hug first and say \"sorry, I shouldn't have backed out, I really was \
tired, but my tone upset you.\"
*   **For {her}:** say how it felt instead of blaming, like \"seeing the dishes left made me feel \
our agreement didn't matter to you.\"

**7. The cat's closing words**
Home is a place for love, not for winning arguments. The dishes can wait until tomorrow, the hug \
can't. Go make up, meow~
"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn canned_verdict_uses_case_names() {
        let case = CaseDetails {
            male_name: "Mochi".into(),
            female_name: "Her".into(),
            male_story: "x".into(),
            male_feelings: String::new(),
            female_story: "y".into(),
            female_feelings: String::new(),
        };

        let verdict = CannedJudge.judge(&case).await.unwrap();

        assert!(verdict.starts_with("**1. Case summary**"));
        assert!(verdict.contains("**2. Mochi's position**"));
        assert!(verdict.contains("**For Her:**"));
    }
}

//! Prompt construction for the three classification passes.
//!
//! Every pass sends a system framing followed by one user turn carrying the
//! literal transcript. The conservative pass also appends the enumerated
//! Level 1 criteria to the user turn; the other two passes do not.

use crate::oracle::ChatMessage;

use super::types::Stage;

/// Line-2 page format shared by all passes.
const PAGE_FORMAT: &str = "L[1 or 2], [age] y/o, Vitals(BP, HR, RR), GCS: , MOI (), ETA:";

const CONSERVATIVE_SYSTEM: &str = "\
You are part of a **layered trauma triage system**. Your task is to take a conservative approach: \
only assign **Level 1 trauma activation** if the case clearly meets major criteria. \
This is Step 1 in a multi-prompt funnel.

== DECISION RULE ==
- If ANY Level 1 criteria are clearly met, return 1.
- If not, default to Level 2 (return 2).

== OUTPUT FORMAT ==
Line 1: 1 or 2 only
Line 2: {PAGE}

== STRATEGY ==
- Do not guess. Only activate Level 1 if the criteria are explicit.
- Be mindful of resource use — avoid unnecessary overtriage.
- If the case is uncertain or ambiguous, default to Level 2.
- Consider the patient as a whole: vitals, GCS, and MOI together.
";

/// Level 1 activation criteria, appended to the conservative user turn.
pub const LEVEL_ONE_CRITERIA: &str = "\
== LEVEL 1 TRAUMA ACTIVATION CRITERIA ==

1A. Respiratory compromise or urgent airway management
1B. Intubation at the scene
2A. Open skull fracture
2B. ≥2 proximal long bone fractures
2C. Unstable pelvic fracture
3A. BP < 90 mmHg (age ≥10)
3B. BP < 70 + 2×age (if <9 y/o)
4A. GCS < 10
4B. Intracranial hemorrhage + midline shift
4C. Suspected spinal cord injury
5A. GSW to head/neck/torso/limbs (proximal)
5B. Penetrating injury w/ bleeding risk
6A. Ongoing respiratory support
6B. Requires blood products
7A. Multisystem trauma
8A. Physician discretion
";

const AGGRESSIVE_SYSTEM: &str = "\
You are a pediatric trauma triage expert reviewing an EMS field report. \
Your goal is to **err on the side of patient safety**. \
If there is any plausible indication of high acuity, activate **Level 1**.

== CLASSIFICATION ==
1 = Level 1 Trauma Activation (high risk or concern)
2 = Level 2 Trauma Activation (stable, low-risk)

== WHEN TO RETURN LEVEL 1 ==
- Any clear OR implied Level 1 criteria
- Any suggestion of instability, e.g., altered mental status, airway compromise, abnormal vitals
- High-risk MOI (ejection, rollover, fall >10ft, penetrating injury)
- Combination of moderate factors: e.g., borderline vitals + MOI + unknown GCS
- Vague concerning language (e.g., 'not responsive', 'pretty banged up', 'unconscious')

== STRATEGY ==
- DO NOT wait for exact matches; use clinical judgment.
- Assume that undertriage can cause harm — if in doubt, lean toward Level 1.
- Consider trauma burden (e.g., multiple injuries) even if no single criterion is met.

== OUTPUT FORMAT ==
Line 1: 1 or 2
Line 2: {PAGE}";

const TIEBREAK_SYSTEM: &str = "\
You are the final authority in a pediatric trauma triage system. Prior reviewers have disagreed.

== TASK ==
Make the final call: Level 1 or Level 2 trauma activation?

== INSTRUCTIONS ==
- If **any signs suggest instability**, **altered GCS**, **high-risk mechanism**, or **multiple injuries**, return 1.
- If key info is **missing** (GCS, vitals) and the patient appears altered or there's concerning EMS tone, return 1.
- If the transcript is sparse, vague, or ambiguous but there's any doubt of serious injury, return 1.
- Only return 2 if **all information points to stability** with no high-risk concern.

== OUTPUT FORMAT ==
Line 1: 1 or 2
Line 2: {PAGE}";

fn system_framing(template: &str) -> String {
    template.replace("{PAGE}", PAGE_FORMAT)
}

fn transcript_turn(transcript: &str) -> String {
    format!("TRANSCRIPT:\n{transcript}")
}

/// Stage A: cautious reviewer, Level 1 only on explicit criteria.
pub fn build_conservative_prompt(transcript: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_framing(CONSERVATIVE_SYSTEM)),
        ChatMessage::user(format!(
            "{}\n\n{LEVEL_ONE_CRITERIA}",
            transcript_turn(transcript)
        )),
    ]
}

/// Stage B: safety-biased reviewer.
pub fn build_aggressive_prompt(transcript: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_framing(AGGRESSIVE_SYSTEM)),
        ChatMessage::user(transcript_turn(transcript)),
    ]
}

/// Stage C: final authority, errs toward Level 1 on missing or ambiguous data.
pub fn build_tiebreak_prompt(transcript: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_framing(TIEBREAK_SYSTEM)),
        ChatMessage::user(transcript_turn(transcript)),
    ]
}

pub fn build_prompt(stage: Stage, transcript: &str) -> Vec<ChatMessage> {
    match stage {
        Stage::Conservative => build_conservative_prompt(transcript),
        Stage::Aggressive => build_aggressive_prompt(transcript),
        Stage::Tiebreak => build_tiebreak_prompt(transcript),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ChatRole;

    const T: &str = "14 y/o, GCS 15, BP 118/76, HR 88, RR 16, MOI: fall from standing, ETA 8 min";

    #[test]
    fn every_stage_is_system_then_user() {
        for stage in [Stage::Conservative, Stage::Aggressive, Stage::Tiebreak] {
            let msgs = build_prompt(stage, T);
            assert_eq!(msgs.len(), 2);
            assert_eq!(msgs[0].role, ChatRole::System);
            assert_eq!(msgs[1].role, ChatRole::User);
            assert!(msgs[1].content.starts_with("TRANSCRIPT:\n"));
            assert!(msgs[1].content.contains(T));
            assert!(msgs[0].content.contains("Line 1: 1 or 2"));
            assert!(!msgs[0].content.contains("{PAGE}"));
        }
    }

    #[test]
    fn criteria_only_in_conservative_user_turn() {
        let a = build_conservative_prompt(T);
        assert!(a[1].content.contains("LEVEL 1 TRAUMA ACTIVATION CRITERIA"));
        assert!(a[1].content.contains("4A. GCS < 10"));
        assert!(!a[0].content.contains("4A. GCS < 10"));

        for msgs in [build_aggressive_prompt(T), build_tiebreak_prompt(T)] {
            assert!(!msgs[1].content.contains("ACTIVATION CRITERIA"));
            assert_eq!(msgs[1].content, format!("TRANSCRIPT:\n{T}"));
        }
    }

    #[test]
    fn framings_carry_their_bias() {
        assert!(build_conservative_prompt(T)[0].content.contains("default to Level 2"));
        assert!(build_aggressive_prompt(T)[0].content.contains("err on the side of patient safety"));
        assert!(build_tiebreak_prompt(T)[0].content.contains("final authority"));
    }
}

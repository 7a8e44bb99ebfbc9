//! Prompt construction for each scenario step

use super::{ScenarioInput, Turn};

pub const NARRATOR_SYSTEM: &str = "You are a writer who conveys disaster situations vividly in \
the first person. Describe the scene so the user feels they are the person living through it.";

pub const CONTINUATION_SYSTEM: &str = "You are a disaster simulation writer. Keep every earlier \
choice and its consequences consistent, and show the concrete result of the most recent choice.";

pub const CHOICES_SYSTEM: &str = "You are a disaster response expert. Offer realistic actions an \
ordinary person could actually take in this situation.";

pub const SURVIVAL_SYSTEM: &str = "You are a disaster safety expert. Do not underestimate how \
serious a disaster is. Judge survival odds strictly and realistically, without optimism.";

pub const FEEDBACK_SYSTEM: &str = "You are a disaster safety instructor. Evaluate the user's \
choice and give constructive feedback.";

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Narration prompt for the next situation, with its system message
#[must_use]
pub fn situation(input: &ScenarioInput) -> (&'static str, String) {
    let scenario = &input.scenario;
    let report = &input.report;

    let Some(last) = input.history.last() else {
        let prompt = format!(
            "You are now at this place:\n\
             - Time: {}\n\
             - Location: latitude {}, longitude {}\n\n\
             What you are witnessing:\n{}\n\n\
             This is a '{}' situation. ({})\n\n\
             Describe, briefly and in the first person, what you are going through on the scene.\n\n\
             Write 2-4 sentences covering:\n\
             - what is happening around you\n\
             - the immediate danger you feel\n\
             - what you think you should do right now",
            report.reported_date,
            report.latitude,
            report.longitude,
            report.description,
            scenario.title,
            scenario.description
        );
        return (NARRATOR_SYSTEM, prompt);
    };

    let mut history = String::new();
    for (i, turn) in input.history.iter().enumerate() {
        history.push_str(&format!(
            "\n[Situation {}]\n{}\n-> Your choice: {}\n",
            i + 1,
            turn.situation,
            turn.choice
        ));
    }

    let prompt = format!(
        "=== Scenario ===\n\
         Disaster type: {}\n\
         Description: {}\n\
         Started: {}\n\
         Current location: latitude {}, longitude {}\n\n\
         === Progress so far ===\n{}\n\
         === Instructions ===\n\
         Taking every choice and outcome above into account, describe the direct result of the \
         most recent choice (\"{}\") and the new situation.\n\n\
         Write 2-4 sentences in the first person, and include:\n\
         1. How the most recent action played out and its immediate result\n\
         2. A hint that the effects of earlier choices still hold\n\
         3. How the situation changed (better or worse)\n\
         4. A new problem or opportunity\n\n\
         Important: actions chosen earlier (calling 119, reaching a safe spot and so on) remain in \
         effect and must be reflected in the current situation.",
        scenario.title,
        scenario.description,
        scenario.start_date,
        report.latitude,
        report.longitude,
        history,
        last.choice
    );
    (CONTINUATION_SYSTEM, prompt)
}

/// Prompt asking for three numbered actions
#[must_use]
pub fn choices(situation: &str, history: &[Turn]) -> String {
    let mut context = String::new();
    if !history.is_empty() {
        context.push_str("\n=== Progress so far ===\n");
        for (i, turn) in history.iter().enumerate() {
            context.push_str(&format!(
                "{}. {} -> {}...\n",
                i + 1,
                turn.choice,
                truncate_chars(&turn.situation, 50)
            ));
        }
        context.push_str(
            "\nEarlier actions (calling 119, getting to safety and so on) still hold; the options \
             must take them into account.\n",
        );
    }

    format!(
        "{context}\n=== Current situation ===\n{situation}\n\n\
         Give three concrete, realistic actions you could take yourself right now.\n\n\
         Use exactly this format:\n\
         1. [first action]\n\
         2. [second action]\n\
         3. [third action]\n\n\
         Each action must be something an ordinary person can do on the scene, take the current \
         situation and earlier actions into account, and fit on one line."
    )
}

/// Prompt asking for a survival estimate as JSON
#[must_use]
pub fn survival_rate(scenario_title: &str, situation: &str, history: &[Turn]) -> String {
    let context = history
        .last()
        .map(|last| {
            format!(
                "\nPrevious situation: {}\nChosen action: {}\n",
                truncate_chars(&last.situation, 100),
                last.choice
            )
        })
        .unwrap_or_default();

    format!(
        "=== Scenario ===\nDisaster type: {scenario_title}\n{context}\n\
         === Current situation ===\n{situation}\n\n\
         Analyse the situation and answer in JSON:\n\
         {{\n  \"survival_rate\": <integer 0-100>,\n  \"change\": \"<+/- number>\"\n}}\n\n\
         Scale (be strict):\n\
         - 90-100: rescued or in a fully safe place (almost never)\n\
         - 75-89: with professional rescuers and a safe evacuation route\n\
         - 60-74: responded well but hazards remain\n\
         - 45-59: dangerous, a wrong choice threatens life\n\
         - 30-44: very dangerous, death likely without immediate action\n\
         - 15-29: extremely dangerous, survival unlikely\n\
         - 0-14: almost certainly fatal\n\n\
         This is a disaster. Do not be optimistic: initial situations are mostly 30-50, good \
         choices 50-70, the best response 70-85, and 100 only once rescued.\n\n\
         change is \"0\" on the first turn, otherwise the effect of the previous choice (+10, -5 \
         and so on).\n\n\
         Output JSON only."
    )
}

/// Prompt asking for an evaluation of the last choice as JSON
#[must_use]
pub fn feedback(
    scenario_title: &str,
    chosen_action: &str,
    previous_situation: &str,
    current_situation: &str,
    available_choices: &[String],
) -> String {
    let available = available_choices
        .iter()
        .filter(|c| !c.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "=== Scenario ===\nDisaster type: {scenario_title}\n\n\
         === Previous situation ===\n{previous_situation}\n\n\
         === Actions that were available ===\n{available}\n\n\
         === Action the user chose ===\n{chosen_action}\n\n\
         === Result (current situation) ===\n{current_situation}\n\n\
         Evaluate the choice and answer in JSON:\n\
         {{\n\
         \x20 \"chosen_action\": \"{chosen_action}\",\n\
         \x20 \"evaluation\": \"<excellent|good|neutral|risky|dangerous>\",\n\
         \x20 \"comment\": \"<1-2 sentence expert comment>\",\n\
         \x20 \"better_choice\": \"<a better action if there clearly was one, otherwise null>\",\n\
         \x20 \"survival_impact\": \"<+/- number>\"\n\
         }}\n\n\
         Evaluation scale:\n\
         - excellent: best choice, survival rises sharply\n\
         - good: sound choice, survival rises\n\
         - neutral: acceptable, little change\n\
         - risky: dangerous choice, survival falls\n\
         - dangerous: very dangerous choice, survival falls sharply\n\n\
         Keep the comment short and explain the rating.\n\n\
         Output JSON only."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{Report, Scenario};

    fn input(history: Vec<Turn>) -> ScenarioInput {
        ScenarioInput {
            scenario: Scenario {
                title: "Typhoon drill".to_string(),
                description: "Summer typhoon emergency response drill".to_string(),
                start_date: "2024-07-15".to_string(),
            },
            report: Report {
                title: "Flooding".to_string(),
                latitude: 37.5665,
                longitude: 126.978,
                description: "Underground car park near Gangnam station is flooding".to_string(),
                reported_date: "2024-07-15T14:30:00".to_string(),
            },
            history,
        }
    }

    #[test]
    fn test_first_turn_uses_narrator() {
        let (system, prompt) = situation(&input(Vec::new()));
        assert_eq!(system, NARRATOR_SYSTEM);
        assert!(prompt.contains("Underground car park"));
        assert!(prompt.contains("'Typhoon drill'"));
    }

    #[test]
    fn test_later_turn_embeds_history() {
        let history = vec![
            Turn {
                situation: "Water is rising fast.".to_string(),
                choice: "Call 119".to_string(),
            },
            Turn {
                situation: "Help is five minutes away.".to_string(),
                choice: "Climb onto a car roof".to_string(),
            },
        ];
        let (system, prompt) = situation(&input(history));
        assert_eq!(system, CONTINUATION_SYSTEM);
        assert!(prompt.contains("[Situation 1]\nWater is rising fast.\n-> Your choice: Call 119"));
        assert!(prompt.contains("most recent choice (\"Climb onto a car roof\")"));
    }

    #[test]
    fn test_choices_prompt_truncates_history() {
        let history = vec![Turn {
            situation: "물".repeat(80),
            choice: "Call 119".to_string(),
        }];
        let prompt = choices("Now what?", &history);
        assert!(prompt.contains(&format!("1. Call 119 -> {}...", "물".repeat(50))));
        assert!(!prompt.contains(&"물".repeat(51)));
    }

    #[test]
    fn test_feedback_prompt_lists_non_empty_choices() {
        let available = vec!["Run".to_string(), String::new(), "Hide".to_string()];
        let prompt = feedback("Flood", "Run", "before", "after", &available);
        assert!(prompt.contains("Run, Hide"));
        assert!(prompt.contains("\"chosen_action\": \"Run\""));
    }
}

//! Screening instruments as static tables.
//!
//! Each instrument is a fixed list of items sharing one answer domain, a score-to-severity band
//! table, and (PTSD only) a yes/no gate item asked before the scored items.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const INVALID_ANSWER: &str = "Please Provide Answers in Required Format !";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disorder {
    Addiction,
    Anxiety,
    Depression,
    #[serde(rename = "PTSD")]
    Ptsd,
}

impl Disorder {
    pub const ALL: [Disorder; 4] = [
        Disorder::Addiction,
        Disorder::Anxiety,
        Disorder::Depression,
        Disorder::Ptsd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Disorder::Addiction => "Addiction",
            Disorder::Anxiety => "Anxiety",
            Disorder::Depression => "Depression",
            Disorder::Ptsd => "PTSD",
        }
    }

    pub fn instrument(&self) -> &'static Instrument {
        match self {
            Disorder::Addiction => &ADDICTION,
            Disorder::Anxiety => &ANXIETY,
            Disorder::Depression => &DEPRESSION,
            Disorder::Ptsd => &PTSD,
        }
    }
}

impl fmt::Display for Disorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disorder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Disorder::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown disorder label: {s}"))
    }
}

/// What a valid answer to an item looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerDomain {
    /// 0, 1, 2 or 3
    Likert,
    /// yes/y scores 1, no/n scores 0
    YesNo,
}

impl AnswerDomain {
    /// Points for a valid answer, `None` when the input is outside the domain
    pub fn parse(&self, input: &str) -> Option<u32> {
        let input = input.trim();
        match self {
            AnswerDomain::Likert => match input {
                "0" => Some(0),
                "1" => Some(1),
                "2" => Some(2),
                "3" => Some(3),
                _ => None,
            },
            AnswerDomain::YesNo => match input.to_ascii_lowercase().as_str() {
                "yes" | "y" => Some(1),
                "no" | "n" => Some(0),
                _ => None,
            },
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            AnswerDomain::Likert => "(answer 0, 1, 2 or 3)",
            AnswerDomain::YesNo => "(answer yes or no)",
        }
    }
}

/// Severity bucket covering scores up to `upper` inclusive; `None` is open-ended
#[derive(Debug)]
pub struct Band {
    pub upper: Option<u32>,
    pub label: &'static str,
    pub advice: &'static str,
}

/// Screening question that ends the instrument early when answered "no"
#[derive(Debug)]
pub struct Gate {
    pub question: &'static str,
    pub exit_severity: &'static str,
    pub exit_message: &'static str,
}

#[derive(Debug)]
pub struct Instrument {
    pub disorder: Disorder,
    pub title: &'static str,
    pub intro: &'static str,
    pub domain: AnswerDomain,
    pub gate: Option<Gate>,
    pub items: &'static [&'static str],
    pub bands: &'static [Band],
}

/// Where a user stands inside an instrument
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub gate_passed: bool,
    pub answered: usize,
    pub score: u32,
    pub finished: bool,
}

/// Result of feeding one answer to an instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Input rejected; progress untouched
    Reprompt(String),
    /// Answer recorded; ask this next
    Ask(&'static str),
    /// Instrument done
    Finished {
        severity: &'static str,
        message: String,
    },
}

impl Instrument {
    /// First thing asked after classification
    pub fn opening_question(&self) -> &'static str {
        self.pending_question(&Progress::default())
    }

    pub fn pending_question(&self, progress: &Progress) -> &'static str {
        match &self.gate {
            Some(gate) if !progress.gate_passed => gate.question,
            _ => self
                .items
                .get(progress.answered)
                .copied()
                .unwrap_or_default(),
        }
    }

    pub fn band_for(&self, score: u32) -> &'static Band {
        self.bands
            .iter()
            .find(|band| band.upper.is_none_or(|upper| score <= upper))
            .unwrap_or(&self.bands[self.bands.len() - 1])
    }

    pub fn severity_for(&self, score: u32) -> &'static str {
        self.band_for(score).label
    }

    pub fn max_score(&self) -> u32 {
        let per_item = match self.domain {
            AnswerDomain::Likert => 3,
            AnswerDomain::YesNo => 1,
        };
        per_item * self.items.len() as u32
    }

    /// Apply one answer. Invalid input re-prompts without touching `progress`.
    pub fn advance(&self, progress: &mut Progress, input: &str) -> Step {
        let Some(points) = self.domain.parse(input) else {
            return Step::Reprompt(format!(
                "{INVALID_ANSWER} {}\n{}",
                self.domain.hint(),
                self.pending_question(progress)
            ));
        };

        if let Some(gate) = &self.gate {
            if !progress.gate_passed {
                if points == 0 {
                    progress.finished = true;
                    return Step::Finished {
                        severity: gate.exit_severity,
                        message: gate.exit_message.to_string(),
                    };
                }
                progress.gate_passed = true;
                return Step::Ask(self.pending_question(progress));
            }
        }

        progress.score += points;
        progress.answered += 1;

        if progress.answered < self.items.len() {
            return Step::Ask(self.pending_question(progress));
        }

        progress.finished = true;
        let band = self.band_for(progress.score);
        Step::Finished {
            severity: band.label,
            message: format!(
                "The Severity of your {} is {}.\n{}",
                self.title, band.label, band.advice
            ),
        }
    }
}

const LIKERT_FREQUENCY_INTRO: &str = "Now could you please answer a few symptom related questions, to help me diagnose the severity of your disorder?\n\
Answer 0: Not at all\n\
Answer 1: Several days\n\
Answer 2: More than half the days\n\
Answer 3: Nearly every day\n\
NOTE: Please provide numerical input!";

pub static ANXIETY: Instrument = Instrument {
    disorder: Disorder::Anxiety,
    title: "Anxiety Disorder",
    intro: LIKERT_FREQUENCY_INTRO,
    domain: AnswerDomain::Likert,
    gate: None,
    items: &[
        "Feeling nervous, anxious, or on edge?",
        "Not being able to stop or control worrying?",
        "Worrying too much about different things?",
        "Trouble relaxing?",
        "Being so restless that it is hard to sit still?",
        "Becoming easily annoyed or irritable?",
        "Feeling afraid, as if something awful might happen?",
    ],
    bands: &[
        Band {
            upper: Some(4),
            label: "Minimal",
            advice: "You can refer to professional help or you can also try our Anxiety Health Counsellor.",
        },
        Band {
            upper: Some(9),
            label: "Mild",
            advice: "You can refer to professional help or you can also try our Anxiety Health Counsellor.",
        },
        Band {
            upper: Some(14),
            label: "Moderate",
            advice: "I recommend taking professional help. Along with that you can also try our Anxiety Health Counsellor.",
        },
        Band {
            upper: None,
            label: "Severe",
            advice: "You can try our Anxiety Health Counsellor, but I strongly recommend taking professional help.",
        },
    ],
};

pub static DEPRESSION: Instrument = Instrument {
    disorder: Disorder::Depression,
    title: "Depression Disorder",
    intro: LIKERT_FREQUENCY_INTRO,
    domain: AnswerDomain::Likert,
    gate: None,
    items: &[
        "Little interest or pleasure in doing things?",
        "Feeling down, depressed, or hopeless?",
        "Trouble falling or staying asleep, or sleeping too much?",
        "Feeling tired or having little energy?",
        "Poor appetite or overeating?",
        "Feeling bad about yourself, or that you are a failure, or have let yourself or your family down?",
        "Trouble concentrating on things, such as reading the newspaper or watching television?",
        "Moving or speaking so slowly that other people could have noticed? Or the opposite, being so fidgety or restless that you have been moving around a lot more than usual?",
        "Thoughts that you would be better off dead, or of hurting yourself?",
    ],
    bands: &[
        Band {
            upper: Some(4),
            label: "Minimal",
            advice: "You can refer to professional help or you can also try our Depression Health Counsellor.",
        },
        Band {
            upper: Some(9),
            label: "Mild",
            advice: "You can refer to professional help or you can also try our Depression Health Counsellor.",
        },
        Band {
            upper: Some(14),
            label: "Moderate",
            advice: "I recommend taking professional help. Along with that you can also try our Depression Health Counsellor.",
        },
        Band {
            upper: Some(19),
            label: "Moderately Severe",
            advice: "You can try our Depression Health Counsellor, but I strongly recommend taking professional help.",
        },
        Band {
            upper: None,
            label: "Severe",
            advice: "I strongly recommend taking professional help, however you can also try our Depression Health Counsellor.",
        },
    ],
};

pub static PTSD: Instrument = Instrument {
    disorder: Disorder::Ptsd,
    title: "PTSD Disorder",
    intro: "Now could you please answer a few symptom related questions, to help me diagnose the severity of your disorder?\n\
NOTE: Please answer 'yes' or 'no'!\n\n\
Sometimes things happen to people that are unusually or especially frightening, horrible, or traumatic. For example:\n\
- A serious accident or fire\n\
- A physical or sexual assault or abuse\n\
- Seeing someone get killed or seriously injured\n\
- Having a loved one die through homicide or suicide",
    domain: AnswerDomain::YesNo,
    gate: Some(Gate {
        question: "Have you ever experienced this kind of event?",
        exit_severity: "Minimal",
        exit_message: "PTSDs are generally caused due to a traumatic event. I would recommend you to consult our PTSD Mental Health Counsellor or consider taking professional help.",
    }),
    items: &[
        "Had nightmares about it or thought about it when you did not want to?",
        "Tried hard not to think about it or went out of your way to avoid situations that reminded you of it?",
        "Were constantly on guard, watchful, or easily startled?",
        "Felt numb or detached from others, activities, or your surroundings?",
        "Felt guilty or unable to stop blaming yourself or others for the event or any problems the event may have caused?",
    ],
    bands: &[
        Band {
            upper: Some(2),
            label: "Mild",
            advice: "You can refer to professional help or you can also try our PTSD Health Counsellor.",
        },
        Band {
            upper: None,
            label: "Moderate/Severe",
            advice: "You can try our PTSD Health Counsellor, but I strongly recommend taking professional help.",
        },
    ],
};

pub static ADDICTION: Instrument = Instrument {
    disorder: Disorder::Addiction,
    title: "Addiction Disorder",
    intro: "Now could you please answer a few symptom related questions, to help me diagnose the severity of your disorder?\n\
Answer 0: Not at all\n\
Answer 1: Sometimes\n\
Answer 2: Often\n\
Answer 3: Always\n\
NOTE: Please provide numerical input!",
    domain: AnswerDomain::Likert,
    gate: None,
    items: &[
        "How often do you have strong urges or cravings to use the substance or engage in the behavior?",
        "How often do you find it difficult to control or stop using the substance or engaging in the behavior?",
        "How often do you need to use more of the substance or engage more in the behavior to achieve the same effect?",
        "How often do you experience physical or emotional withdrawal symptoms when you try to stop using the substance or engaging in the behavior?",
        "How often do you neglect your responsibilities at work, school, or home due to your use of the substance or engagement in the behavior?",
        "How often do you continue to use the substance or engage in the behavior despite knowing it causes problems in your life?",
        "How often do you spend a lot of time obtaining, using, or recovering from the substance or behavior?",
        "How often do you lose interest in other activities or hobbies because of your use of the substance or engagement in the behavior?",
        "How often do you continue to use the substance or engage in the behavior in situations where it is physically dangerous (e.g., driving, operating machinery)?",
        "How often do you feel guilty or ashamed about your use of the substance or engagement in the behavior?",
    ],
    bands: &[
        Band {
            upper: Some(6),
            label: "Mild",
            advice: "You can refer to professional help or you can also try our Addiction Health Counsellor.",
        },
        Band {
            upper: Some(15),
            label: "Moderate",
            advice: "You can refer to professional help or you can also try our Addiction Health Counsellor.",
        },
        Band {
            upper: Some(24),
            label: "Mildly Severe",
            advice: "I recommend taking professional help. Along with that you can also try our Addiction Health Counsellor.",
        },
        Band {
            upper: None,
            label: "Severe",
            advice: "You can try our Addiction Health Counsellor, but I strongly recommend taking professional help.",
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(instrument: &Instrument, answers: &[&str]) -> (Progress, Vec<Step>) {
        let mut progress = Progress::default();
        let steps = answers
            .iter()
            .map(|answer| instrument.advance(&mut progress, answer))
            .collect();
        (progress, steps)
    }

    #[test]
    fn item_counts_match_the_instruments() {
        assert_eq!(ANXIETY.items.len(), 7);
        assert_eq!(DEPRESSION.items.len(), 9);
        assert_eq!(PTSD.items.len(), 5);
        assert_eq!(ADDICTION.items.len(), 10);
    }

    #[test]
    fn anxiety_thresholds() {
        let cases = [
            (0, "Minimal"),
            (4, "Minimal"),
            (5, "Mild"),
            (6, "Mild"),
            (9, "Mild"),
            (10, "Moderate"),
            (14, "Moderate"),
            (15, "Severe"),
            (21, "Severe"),
        ];
        for (score, label) in cases {
            assert_eq!(ANXIETY.severity_for(score), label, "score {score}");
        }
    }

    #[test]
    fn depression_thresholds() {
        let cases = [
            (4, "Minimal"),
            (9, "Mild"),
            (14, "Moderate"),
            (15, "Moderately Severe"),
            (19, "Moderately Severe"),
            (20, "Severe"),
            (27, "Severe"),
        ];
        for (score, label) in cases {
            assert_eq!(DEPRESSION.severity_for(score), label, "score {score}");
        }
    }

    #[test]
    fn addiction_and_ptsd_thresholds() {
        assert_eq!(ADDICTION.severity_for(6), "Mild");
        assert_eq!(ADDICTION.severity_for(7), "Moderate");
        assert_eq!(ADDICTION.severity_for(15), "Moderate");
        assert_eq!(ADDICTION.severity_for(16), "Mildly Severe");
        assert_eq!(ADDICTION.severity_for(24), "Mildly Severe");
        assert_eq!(ADDICTION.severity_for(25), "Severe");
        assert_eq!(PTSD.severity_for(2), "Mild");
        assert_eq!(PTSD.severity_for(3), "Moderate/Severe");
    }

    #[test]
    fn every_instrument_covers_its_full_score_range() {
        for disorder in Disorder::ALL {
            let instrument = disorder.instrument();
            assert_eq!(instrument.disorder, disorder);
            let last = instrument.bands.last().unwrap();
            assert!(last.upper.is_none(), "{disorder} has no open-ended top band");
            assert!(instrument.band_for(instrument.max_score()).upper.is_none());
        }
    }

    #[test]
    fn answer_domains() {
        assert_eq!(AnswerDomain::Likert.parse(" 2 "), Some(2));
        assert_eq!(AnswerDomain::Likert.parse("4"), None);
        assert_eq!(AnswerDomain::Likert.parse("-1"), None);
        assert_eq!(AnswerDomain::Likert.parse("two"), None);
        assert_eq!(AnswerDomain::YesNo.parse("YeS"), Some(1));
        assert_eq!(AnswerDomain::YesNo.parse("n"), Some(0));
        assert_eq!(AnswerDomain::YesNo.parse("maybe"), None);
    }

    #[test]
    fn anxiety_walk_scoring_six_is_mild() {
        let (progress, steps) = walk(&ANXIETY, &["1", "1", "1", "1", "1", "1", "0"]);

        assert_eq!(steps[0], Step::Ask(ANXIETY.items[1]));
        assert_eq!(progress.score, 6);
        assert!(progress.finished);
        match steps.last().unwrap() {
            Step::Finished { severity, message } => {
                assert_eq!(*severity, "Mild");
                assert!(message.starts_with("The Severity of your Anxiety Disorder is Mild."));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn invalid_answer_does_not_advance() {
        let mut progress = Progress::default();
        ANXIETY.advance(&mut progress, "2");
        let before = progress.clone();

        let step = ANXIETY.advance(&mut progress, "often");

        assert_eq!(progress, before);
        match step {
            Step::Reprompt(text) => {
                assert!(text.starts_with(INVALID_ANSWER));
                assert!(text.ends_with(ANXIETY.items[1]));
            }
            other => panic!("expected re-prompt, got {other:?}"),
        }
    }

    #[test]
    fn ptsd_without_trauma_exits_early_as_minimal() {
        let (progress, steps) = walk(&PTSD, &["no"]);

        assert!(progress.finished);
        assert_eq!(progress.answered, 0);
        assert!(matches!(
            &steps[0],
            Step::Finished { severity: "Minimal", .. }
        ));
    }

    #[test]
    fn ptsd_gate_is_not_scored() {
        let (progress, steps) = walk(&PTSD, &["yes", "yes", "no", "yes", "no", "no"]);

        assert_eq!(steps[0], Step::Ask(PTSD.items[0]));
        assert_eq!(progress.score, 2);
        assert!(matches!(
            steps.last().unwrap(),
            Step::Finished { severity: "Mild", .. }
        ));
    }

    #[test]
    fn ptsd_three_yes_answers_is_moderate_or_severe() {
        let (_, steps) = walk(&PTSD, &["y", "y", "y", "y", "n", "n"]);
        assert!(matches!(
            steps.last().unwrap(),
            Step::Finished { severity: "Moderate/Severe", .. }
        ));
    }

    #[test]
    fn depression_and_addiction_need_every_item() {
        let (progress, steps) = walk(&DEPRESSION, &["3"; 8]);
        assert!(!progress.finished);
        assert!(matches!(steps.last().unwrap(), Step::Ask(_)));

        let (progress, steps) = walk(&ADDICTION, &["3"; 10]);
        assert!(progress.finished);
        assert_eq!(progress.score, 30);
        assert!(matches!(
            steps.last().unwrap(),
            Step::Finished { severity: "Severe", .. }
        ));
    }

    #[test]
    fn depression_finishes_on_the_ninth_item() {
        let (progress, steps) = walk(&DEPRESSION, &["2", "2", "2", "2", "2", "2", "2", "2", "0"]);

        assert!(progress.finished);
        assert_eq!(progress.answered, 9);
        assert_eq!(progress.score, 16);
        assert!(steps[..8].iter().all(|step| matches!(step, Step::Ask(_))));
        match steps.last().unwrap() {
            Step::Finished { severity, message } => {
                assert_eq!(*severity, "Moderately Severe");
                assert!(message.contains("strongly recommend taking professional help"));
            }
            other => panic!("expected a finished step, got {other:?}"),
        }
    }

    #[test]
    fn disorder_labels_round_trip_through_text() {
        for disorder in Disorder::ALL {
            assert_eq!(disorder.as_str().parse::<Disorder>().unwrap(), disorder);
        }
        assert_eq!("ptsd".parse::<Disorder>().unwrap(), Disorder::Ptsd);
        assert!("Insomnia".parse::<Disorder>().is_err());
        assert_eq!(serde_json::to_string(&Disorder::Ptsd).unwrap(), "\"PTSD\"");
    }
}

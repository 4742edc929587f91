use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use super::DisorderClassifier;
use crate::diagnosis::Disorder;

/// Output order of the sequence-classification head
pub const CLASS_LABELS: [Disorder; 4] = [
    Disorder::Addiction,
    Disorder::Anxiety,
    Disorder::Depression,
    Disorder::Ptsd,
];

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

/// The inference server may answer with a label, raw logits, or both; the label wins
#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: Option<String>,
    logits: Option<Vec<f32>>,
}

/// Calls a hosted text classifier over HTTP (`POST {"text": ...}`)
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DisorderClassifier for HttpClassifier {
    async fn classify(&self, narrative: &str) -> anyhow::Result<Disorder> {
        let response = self
            .client
            .post(&self.url)
            .json(&ClassifyRequest { text: narrative })
            .send()
            .await?
            .error_for_status()?
            .json::<ClassifyResponse>()
            .await?;

        let disorder = interpret(response)?;
        info!(disorder = %disorder, narrative_len = narrative.len(), "Narrative classified");
        Ok(disorder)
    }
}

fn interpret(response: ClassifyResponse) -> anyhow::Result<Disorder> {
    if let Some(label) = response.label {
        return label.parse();
    }
    let logits = response
        .logits
        .ok_or_else(|| anyhow::anyhow!("classifier returned neither label nor logits"))?;
    disorder_from_logits(&logits)
}

/// Argmax over the logits, in `CLASS_LABELS` order
pub(crate) fn disorder_from_logits(logits: &[f32]) -> anyhow::Result<Disorder> {
    if logits.len() != CLASS_LABELS.len() {
        anyhow::bail!(
            "expected {} logits, got {}",
            CLASS_LABELS.len(),
            logits.len()
        );
    }

    let (index, _) = logits
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &value)| {
            if value > best.1 { (i, value) } else { best }
        });

    Ok(CLASS_LABELS[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_follows_label_order() {
        assert_eq!(
            disorder_from_logits(&[0.1, 2.5, -1.0, 0.3]).unwrap(),
            Disorder::Anxiety
        );
        assert_eq!(
            disorder_from_logits(&[-3.0, -2.0, -1.0, -0.5]).unwrap(),
            Disorder::Ptsd
        );
    }

    #[test]
    fn ties_pick_the_first_label() {
        assert_eq!(
            disorder_from_logits(&[1.0, 1.0, 0.0, 0.0]).unwrap(),
            Disorder::Addiction
        );
    }

    #[test]
    fn wrong_logit_count_is_an_error() {
        assert!(disorder_from_logits(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn label_takes_precedence_over_logits() {
        let response = ClassifyResponse {
            label: Some("depression".to_string()),
            logits: Some(vec![9.0, 0.0, 0.0, 0.0]),
        };
        assert_eq!(interpret(response).unwrap(), Disorder::Depression);
    }

    #[test]
    fn empty_response_is_an_error() {
        let response = ClassifyResponse {
            label: None,
            logits: None,
        };
        assert!(interpret(response).is_err());
    }
}

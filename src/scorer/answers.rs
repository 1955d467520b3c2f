use super::{MarkScorer, round4};
use crate::models::QuestionSpec;
use image::GrayImage;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Marks read for one question
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuestionReading {
    /// Labels at or above the fill threshold, in print order
    pub chosen: Vec<String>,
    /// Rounded fill ratio per label
    pub confidence: BTreeMap<String, f64>,
}

/// Marks read for every question, keyed by question id
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnswerReadings {
    /// Chosen labels per question
    pub answers: BTreeMap<i64, Vec<String>>,
    /// Rounded fill ratio per question and label
    pub confidence: BTreeMap<i64, BTreeMap<String, f64>>,
}

impl MarkScorer {
    /// Score one question row
    pub fn read_question(&self, gray: &GrayImage, question: &QuestionSpec) -> QuestionReading {
        let mut reading = QuestionReading::default();
        for option in &question.options {
            let ratio = self.score(gray, option.x, option.y, option.r);
            if self.is_filled(ratio) {
                reading.chosen.push(option.label.clone());
            }
            reading
                .confidence
                .insert(option.label.clone(), round4(ratio as f64));
        }
        reading
    }

    /// Score every question; rows are independent and scored in parallel
    pub fn read_answers(&self, gray: &GrayImage, questions: &[QuestionSpec]) -> AnswerReadings {
        let rows: Vec<(i64, QuestionReading)> = questions
            .par_iter()
            .map(|q| (q.question_id, self.read_question(gray, q)))
            .collect();

        let mut out = AnswerReadings::default();
        for (id, reading) in rows {
            out.answers.insert(id, reading.chosen);
            out.confidence.insert(id, reading.confidence);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OptionSpec;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};

    fn option(label: &str, x: f32, y: f32) -> OptionSpec {
        OptionSpec {
            label: label.to_string(),
            x,
            y,
            r: 6.0,
        }
    }

    #[test]
    fn test_reads_marked_options() {
        // px_per_pt = 2: bubbles at 12 px radius
        let mut img = GrayImage::from_pixel(300, 200, Luma([245]));
        let questions = vec![
            QuestionSpec {
                question_id: 11,
                options: vec![option("A", 20.0, 20.0), option("B", 50.0, 20.0), option("C", 80.0, 20.0)],
            },
            QuestionSpec {
                question_id: 4,
                options: vec![option("A", 20.0, 60.0), option("B", 50.0, 60.0)],
            },
        ];
        for q in &questions {
            for o in &q.options {
                draw_hollow_circle_mut(&mut img, ((o.x * 2.0) as i32, (o.y * 2.0) as i32), 12, Luma([90]));
            }
        }
        draw_filled_circle_mut(&mut img, (100, 40), 12, Luma([15]));
        draw_filled_circle_mut(&mut img, (160, 40), 12, Luma([15]));

        let readings = MarkScorer::new(2.0, 0.33).read_answers(&img, &questions);
        assert_eq!(readings.answers[&11], vec!["B".to_string(), "C".to_string()]);
        assert!(readings.answers[&4].is_empty());
        assert!(readings.confidence[&11]["B"] > 0.9);
        assert!(readings.confidence[&11]["A"] < 0.33);
        assert_eq!(readings.confidence[&4].len(), 2);
        assert_eq!(readings.answers.keys().copied().collect::<Vec<_>>(), vec![4, 11]);
    }
}

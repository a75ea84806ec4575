use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gradepath_core::evaluator::AnswerEvaluator;
use gradepath_core::model::{
    Activity, ActivityType, Question, QuestionOption, QuestionType, SubmittedAnswer,
};
use gradepath_core::scorer::ActivityScorer;

fn multiple_choice(id: &str, options: usize) -> Question {
    Question {
        id: id.into(),
        activity_id: "quiz".into(),
        question_type: QuestionType::MultipleChoice,
        points: 2,
        correct_answer: None,
        acceptable_answers: vec![],
        case_sensitive: false,
        options: (0..options)
            .map(|i| QuestionOption {
                id: format!("{id}-o{i}"),
                option_text: format!("Option {i}"),
                is_correct: i % 2 == 0,
            })
            .collect(),
    }
}

fn short_answer(id: &str) -> Question {
    Question {
        id: id.into(),
        activity_id: "quiz".into(),
        question_type: QuestionType::ShortAnswer,
        points: 1,
        correct_answer: Some("photosynthesis".into()),
        acceptable_answers: vec!["Photo-synthesis".into(), "photo synthesis".into()],
        case_sensitive: false,
        options: vec![],
    }
}

fn bench_evaluate(c: &mut Criterion) {
    let evaluator = AnswerEvaluator::new();
    let mut group = c.benchmark_group("evaluate");

    let mc = multiple_choice("q1", 8);
    let mc_answer = SubmittedAnswer::new("s1", "q1").with_options(&["q1-o0", "q1-o2", "q1-o4", "q1-o6"]);
    group.bench_function("multiple_choice_8", |b| {
        b.iter(|| evaluator.evaluate(black_box(&mc), black_box(&mc_answer)))
    });

    let text = short_answer("q2");
    let text_answer = SubmittedAnswer::new("s1", "q2").with_text("  PHOTO SYNTHESIS ");
    group.bench_function("short_answer", |b| {
        b.iter(|| evaluator.evaluate(black_box(&text), black_box(&text_answer)))
    });

    group.finish();
}

fn bench_score_activity(c: &mut Criterion) {
    let scorer = ActivityScorer::new();
    let activity = Activity {
        id: "quiz".into(),
        module_id: "m1".into(),
        title: "Quiz".into(),
        activity_type: ActivityType::Quiz,
        passing_score: Some(60.0),
    };

    let mut group = c.benchmark_group("score_activity");
    for size in [10usize, 100] {
        let questions: Vec<Question> = (0..size)
            .map(|i| {
                if i % 2 == 0 {
                    multiple_choice(&format!("q{i}"), 4)
                } else {
                    short_answer(&format!("q{i}"))
                }
            })
            .collect();
        let answers: Vec<SubmittedAnswer> = questions
            .iter()
            .map(|q| match q.question_type {
                QuestionType::MultipleChoice => {
                    let id = format!("{}-o0", q.id);
                    SubmittedAnswer::new("s1", &q.id).with_options(&[id.as_str()])
                }
                _ => SubmittedAnswer::new("s1", &q.id).with_text("photosynthesis"),
            })
            .collect();

        group.bench_function(format!("questions={size}"), |b| {
            b.iter(|| scorer.score(black_box(&activity), black_box(&questions), black_box(&answers)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_score_activity);
criterion_main!(benches);

//! End-to-end tests: segmentation, propagation, learning and evaluation together.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use yomi_core::evaluation::evaluate_model;
use yomi_core::{
    infer_factor, parse_test_cases, parse_tuples, partition, prepare_corpus, train, FirstInQueue,
    LearnerConfig, Model, Partition, TestStatistics, YomiError, WEIGHT_CEILING,
};
use yomi_tests::{assert_close, corpus, overlapping_corpus};

#[test]
fn single_character_word_learns_its_only_reading() {
    let data = corpus(&[("火", "ひ")]);

    let partitions = partition("火", "ひ");
    assert_eq!(partitions, vec![Partition::from_pairs([('火', "ひ")])]);

    let mut model = Model::new(LearnerConfig::default()).expect("config");
    model.run_trial(&data, &mut FirstInQueue).expect("trial");
    let fire = model.node('火').expect("node");
    assert_eq!(fire.distribution().len(), 1);
    assert_close(fire.prob("ひ"), 1.0, 1e-12, "火:ひ");
}

#[test]
fn two_character_word_rejects_leading_nasal() {
    let partitions = partition("火山", "かざん");
    assert_eq!(
        partitions,
        vec![Partition::from_pairs([('火', "か"), ('山', "ざん")])]
    );
    assert!(partitions
        .iter()
        .all(|p| p.segments().iter().all(|s| !s.reading.starts_with('ん'))));

    let (model, _) = train(
        &corpus(&[("火山", "かざん")]),
        LearnerConfig::default(),
        &mut FirstInQueue,
    )
    .expect("train");
    assert_close(model.prob('火', "か").expect("火"), 1.0, 1e-12, "火:か");
    assert_close(model.prob('山', "ざん").expect("山"), 1.0, 1e-12, "山:ざん");
}

#[test]
fn phonetic_prefix_is_consumed_literally() {
    let partitions = partition("お茶", "おちゃ");
    assert_eq!(partitions.len(), 1);
    let segments = partitions[0].segments();
    assert!(segments[0].literal);
    assert_eq!(&*segments[1].reading, "ちゃ");

    let (model, _) = train(
        &corpus(&[("お茶", "おちゃ")]),
        LearnerConfig::default(),
        &mut FirstInQueue,
    )
    .expect("train");
    assert!(model.node('お').is_none());
    assert_close(model.prob('茶', "ちゃ").expect("茶"), 1.0, 1e-12, "茶:ちゃ");
}

#[test]
fn shared_characters_pull_ambiguous_splits() {
    // 大 is seen alone as おお, which should make 大:おお 山:やま the best split.
    let data = corpus(&[("大", "おお"), ("山", "やま"), ("大山", "おおやま")]);
    let (model, summaries) =
        train(&data, LearnerConfig::default(), &mut FirstInQueue).expect("train");
    assert_eq!(summaries.len(), 3);

    let factor = model.factor_for("大山", "おおやま").expect("factor");
    let best = factor.best_partition().expect("best");
    assert_eq!(best.to_string(), "大:おお 山:やま");
    let best_index = factor.best_index().expect("index");
    assert_close(factor.omegas()[best_index], WEIGHT_CEILING, 1e-9, "best omega");
}

#[test]
fn trials_keep_weight_vectors_aligned() {
    let data = overlapping_corpus();
    let config = LearnerConfig {
        trials: 4,
        ..LearnerConfig::default()
    };
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    let (model, summaries) = train(&data, config, &mut rng).expect("train");

    assert_eq!(model.trials_completed(), 4);
    assert_eq!(
        summaries.iter().map(|s| s.trial).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
    // Later trials revisit the factors built by the first one.
    assert_eq!(model.corpus_order().len(), data.len());
    assert_eq!(model.factors().len(), data.len());

    for factor in model.factors() {
        assert_eq!(factor.omegas().len(), factor.partitions().len());
        if !factor.omegas().is_empty() {
            let max = factor.omegas().iter().copied().fold(f64::MIN, f64::max);
            assert_close(max, WEIGHT_CEILING, 1e-9, "omega ceiling");
        }
    }
    for node in model.nodes().iter() {
        assert_eq!(node.alphas().len(), node.factors().len());
        let max = node.alphas().iter().copied().fold(f64::MIN, f64::max);
        assert_close(max, WEIGHT_CEILING, 1e-9, "alpha ceiling");
        for (_, p) in node.distribution().iter() {
            assert!((0.0..=1.0 + 1e-12).contains(&p), "probability {} out of range", p);
        }
        assert_close(node.smoothing(), config.reset_smoothing, 0.0, "smoothing");
    }
}

#[test]
fn seeded_training_is_reproducible() {
    let data = overlapping_corpus();
    let run = |seed| {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        train(&data, LearnerConfig::default(), &mut rng).expect("train")
    };
    let (first, first_summaries) = run(2024);
    let (second, second_summaries) = run(2024);

    assert_eq!(first_summaries, second_summaries);
    assert_eq!(first.node_reports(), second.node_reports());
    assert_eq!(first.factor_reports(), second.factor_reports());
}

#[test]
fn converged_factor_is_a_fixpoint() {
    // 火山 links 火 and 山; the graph is a tree, so propagation settles.
    let config = LearnerConfig {
        max_iterations: 10_000,
        ..LearnerConfig::default()
    };
    let mut model = Model::new(config).expect("config");
    for tuple in corpus(&[("火", "ひ"), ("山", "やま"), ("火山", "かざん")]) {
        model.register(&tuple.word, &tuple.reading);
    }
    let last = *model.corpus_order().last().expect("order");
    let diagnostics = infer_factor(&mut model, last, &mut FirstInQueue).expect("infer");
    assert!(diagnostics.converged);

    for c in ['火', '山'] {
        let id = model.nodes().id_of(c).expect("node");
        assert!(!model.update_distribution(id).expect("update"));
    }
}

#[test]
fn corpus_text_flows_through_preparation() {
    let raw = parse_tuples("お茶 おちゃ\n人々 ひとびと\n食べる たべる\n火山 かざん\n").expect("parse");
    let prepared = prepare_corpus(&raw);
    assert_eq!(
        prepared.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
        vec!["茶 ちゃ", "食 た", "火山 かざん"]
    );

    let bad = parse_tuples("火 ひ\nこわれた\n");
    assert!(matches!(bad, Err(YomiError::Corpus { line: 2, .. })));
}

#[test]
fn evaluation_scores_trained_model() {
    let data = corpus(&[("大", "おお"), ("山", "やま"), ("大山", "おおやま"), ("火山", "かざん")]);
    let (model, _) = train(&data, LearnerConfig::default(), &mut FirstInQueue).expect("train");

    let cases = parse_test_cases("大山 おお,やま\n火山 か,ざん\n").expect("cases");
    let evaluations = evaluate_model(&cases, &model);
    assert!(evaluations.iter().all(|e| e.correct));
    assert_close(evaluations[1].confidence, WEIGHT_CEILING, 0.0, "single partition");

    let stats = TestStatistics::from_evaluations(&evaluations);
    assert_eq!(stats.correct, 2);
    assert_close(stats.accuracy(), 100.0, 1e-12, "accuracy");
    assert!(stats.confidence > WEIGHT_CEILING);
}

#[test]
fn reports_reflect_final_state() {
    let (model, _) = train(
        &corpus(&[("火", "ひ"), ("火山", "かざん")]),
        LearnerConfig::default(),
        &mut FirstInQueue,
    )
    .expect("train");

    let nodes = model.node_reports();
    assert_eq!(
        nodes.iter().map(|n| n.character).collect::<Vec<_>>(),
        vec!['火', '山']
    );
    assert_eq!(nodes[1].to_string(), "山: ざん(100.0)");

    let factors = model.factor_reports();
    assert_eq!(factors.len(), 2);
    assert_eq!(factors[0].to_string(), "--- (火 ひ) ---\n >[  10.0] 火:ひ\n");
}

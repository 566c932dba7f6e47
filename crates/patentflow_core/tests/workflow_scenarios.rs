use patentflow_core::db::open_db_in_memory;
use patentflow_core::{
    Action, Actor, EngineConfig, EventKind, FormFlags, Gate, NewPatent, Patent, Prerequisite,
    Slot, SqlitePatentRepository, StageKind, TaskKind, TransitionRequest, WorkflowError,
    WorkflowService,
};
use rusqlite::Connection;

fn admin() -> Actor {
    Actor::admin("ada")
}

fn service(conn: &Connection) -> WorkflowService<SqlitePatentRepository<'_>> {
    WorkflowService::new(
        SqlitePatentRepository::try_new(conn).unwrap(),
        EngineConfig::default(),
    )
}

fn admin_do(service: &WorkflowService<SqlitePatentRepository<'_>>, patent: &Patent, action: Action) {
    service
        .apply(patent.id, &TransitionRequest::new(admin(), action))
        .unwrap();
}

fn assign(
    service: &WorkflowService<SqlitePatentRepository<'_>>,
    patent: &Patent,
    slot: Slot,
    duty: StageKind,
    name: &str,
) {
    admin_do(
        service,
        patent,
        Action::Assign {
            slot,
            duty,
            assignee: Some(name.to_string()),
            deadline: Some(1_900_000_000_000),
        },
    );
}

fn staffed(service: &WorkflowService<SqlitePatentRepository<'_>>, code: &str) -> Patent {
    let patent = service.create_patent(NewPatent::new(code), &admin()).unwrap();
    for slot in [Slot::PS, Slot::CS] {
        assign(service, &patent, slot, StageKind::Draft, "dana");
        assign(service, &patent, slot, StageKind::File, "farid");
    }
    service.get_patent(patent.id).unwrap()
}

/// Opens every gate and drives PS and CS through approval.
fn finish_tracks(service: &WorkflowService<SqlitePatentRepository<'_>>, patent: &Patent) {
    for gate in [Gate::IdfReceived, Gate::CsDataSent, Gate::CsDataReceived] {
        admin_do(service, patent, Action::SetGate { gate, value: true });
    }
    for slot in [Slot::PS, Slot::CS] {
        service
            .complete_drafting(patent.id, &Actor::drafter("dana"), slot)
            .unwrap();
        service
            .approve_review(patent.id, &admin(), slot, StageKind::Draft)
            .unwrap();
        service
            .complete_filing(patent.id, &Actor::filer("farid"), slot, FormFlags::new())
            .unwrap();
        service
            .approve_review(patent.id, &admin(), slot, StageKind::File)
            .unwrap();
    }
}

#[test]
fn drafting_without_idf_reports_missing_gate() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let patent = staffed(&service, "ipr-a");
    let before = service.timeline(patent.id).unwrap().len();

    let err = service
        .complete_drafting(patent.id, &Actor::drafter("dana"), Slot::PS)
        .unwrap_err();
    match &err {
        WorkflowError::PreconditionNotMet { missing, .. } => {
            assert_eq!(*missing, Prerequisite::IdfReceived);
            assert_eq!(missing.as_str(), "idf_received");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err
        .to_string()
        .contains("IDF must be received before PS Drafting can be completed"));
    assert!(!err.is_retryable());
    assert_eq!(service.timeline(patent.id).unwrap().len(), before);
}

#[test]
fn ps_track_runs_to_stage_complete() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let patent = staffed(&service, "IPR-B");
    admin_do(
        &service,
        &patent,
        Action::SetGate {
            gate: Gate::IdfReceived,
            value: true,
        },
    );

    let drafted = service
        .complete_drafting(patent.id, &Actor::drafter("dana"), Slot::PS)
        .unwrap();
    assert!(drafted.changed);
    assert!(drafted.patent.ps.flags.drafting_done);
    assert!(drafted.patent.ps.flags.drafting_under_review);

    let approved = service
        .approve_review(patent.id, &admin(), Slot::PS, StageKind::Draft)
        .unwrap();
    assert!(!approved.patent.ps.flags.drafting_under_review);

    let mut forms = FormFlags::new();
    forms.insert("form_2".to_string(), true);
    let filed = service
        .complete_filing(patent.id, &Actor::filer("farid"), Slot::PS, forms)
        .unwrap();
    assert!(filed.patent.ps.flags.filing_done);
    assert!(filed.patent.ps.flags.filing_under_review);
    assert!(!filed.patent.ps.stage_complete);

    let complete = service
        .approve_review(patent.id, &admin(), Slot::PS, StageKind::File)
        .unwrap();
    assert!(complete.patent.ps.stage_complete);

    let stored = service.get_patent(patent.id).unwrap();
    assert!(stored.ps.stage_complete);
    assert_eq!(stored.ps.forms.get("form_2"), Some(&true));
    assert_eq!(stored, complete.patent);

    let kinds: Vec<String> = service
        .timeline(patent.id)
        .unwrap()
        .into_iter()
        .map(|event| event.kind.as_str().to_string())
        .filter(|kind| kind.starts_with("ps_"))
        .collect();
    assert_eq!(
        kinds,
        vec![
            "ps_draft_completed",
            "ps_draft_approved",
            "ps_filing_completed",
            "ps_filing_approved",
        ]
    );
}

#[test]
fn deactivating_examination_resets_stale_rounds() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let patent = staffed(&service, "IPR-C");
    admin_do(&service, &patent, Action::SetExaminationActive(true));
    admin_do(&service, &patent, Action::OpenExaminationRound);
    assign(&service, &patent, Slot::Round(1), StageKind::Draft, "dana");
    service
        .complete_drafting(patent.id, &Actor::drafter("dana"), Slot::Round(1))
        .unwrap();

    let active = service.get_patent(patent.id).unwrap();
    assert!(!active.examination_completion);
    assert!(!active.rounds[0].complete);

    admin_do(&service, &patent, Action::SetExaminationActive(false));
    let inactive = service.get_patent(patent.id).unwrap();
    assert!(inactive.examination_completion);
    assert!(!inactive.rounds[0].flags.drafting_done);
    assert!(!inactive.rounds[0].flags.drafting_under_review);
}

#[test]
fn filing_gate_applies_to_every_actor() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let patent = staffed(&service, "IPR-0420");

    for actor in [Actor::filer("farid"), Actor::filer("nobody"), admin()] {
        let err = service
            .complete_filing(patent.id, &actor, Slot::CS, FormFlags::new())
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::PreconditionNotMet {
                missing: Prerequisite::DraftingDone,
                ..
            }
        ));
    }
}

#[test]
fn draft_rejection_cascades_and_records_reason_verbatim() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let patent = staffed(&service, "IPR-0421");
    admin_do(
        &service,
        &patent,
        Action::SetGate {
            gate: Gate::IdfReceived,
            value: true,
        },
    );
    service
        .complete_drafting(patent.id, &Actor::drafter("dana"), Slot::PS)
        .unwrap();
    service
        .complete_filing(patent.id, &Actor::filer("farid"), Slot::PS, FormFlags::new())
        .unwrap();

    let rejected = service
        .reject_review(
            patent.id,
            &admin(),
            Slot::PS,
            StageKind::Draft,
            "incomplete claims",
        )
        .unwrap();
    let flags = rejected.patent.ps.flags;
    assert!(!flags.drafting_done);
    assert!(!flags.drafting_under_review);
    assert!(!flags.filing_done);
    assert!(!flags.filing_under_review);

    let event = rejected.event.unwrap();
    assert_eq!(event.kind.as_str(), "ps_draft_rejected");
    assert!(event.description.contains("incomplete claims"));
    assert_eq!(event.actor_name.as_deref(), Some("ada"));

    let stored = service.timeline(patent.id).unwrap();
    assert_eq!(stored.last(), Some(&event));
}

#[test]
fn second_approval_is_a_no_op_without_event() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let patent = staffed(&service, "IPR-0422");
    admin_do(
        &service,
        &patent,
        Action::SetGate {
            gate: Gate::IdfReceived,
            value: true,
        },
    );
    service
        .complete_drafting(patent.id, &Actor::drafter("dana"), Slot::PS)
        .unwrap();

    let first = service
        .approve_review(patent.id, &admin(), Slot::PS, StageKind::Draft)
        .unwrap();
    assert!(first.changed);
    let events_after_first = service.timeline(patent.id).unwrap().len();

    let second = service
        .approve_review(patent.id, &admin(), Slot::PS, StageKind::Draft)
        .unwrap();
    assert!(!second.changed);
    assert!(second.event.is_none());
    assert_eq!(second.patent, first.patent);
    assert_eq!(service.timeline(patent.id).unwrap().len(), events_after_first);
}

#[test]
fn each_changed_transition_appends_exactly_one_event() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let patent = service
        .create_patent(NewPatent::new("IPR-T").with_title("  Rotor  "), &admin())
        .unwrap();
    assert_eq!(patent.title.as_deref(), Some("Rotor"));
    assert_eq!(service.timeline(patent.id).unwrap().len(), 1);

    let gate = TransitionRequest::new(
        admin(),
        Action::SetGate {
            gate: Gate::CsDataSent,
            value: true,
        },
    );
    assert!(service.apply(patent.id, &gate).unwrap().changed);
    assert!(!service.apply(patent.id, &gate).unwrap().changed);

    let events = service.timeline(patent.id).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::PatentCreated);
    assert_eq!(events[1].kind, EventKind::GateUpdated);
    assert_eq!(service.get_patent(patent.id).unwrap().version, 1);
}

#[test]
fn create_patent_validates_role_code_and_uniqueness() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let err = service
        .create_patent(NewPatent::new("IPR-1"), &Actor::drafter("dana"))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::RoleNotPermitted { .. }));

    let err = service
        .create_patent(NewPatent::new("   "), &admin())
        .unwrap_err();
    assert_eq!(err.code(), "invalid_tracking_code");

    let created = service
        .create_patent(NewPatent::new(" ipr-1 "), &admin())
        .unwrap();
    assert_eq!(created.tracking_code, "IPR-1");

    let err = service
        .create_patent(NewPatent::new("IPR-1"), &admin())
        .unwrap_err();
    assert!(matches!(err, WorkflowError::DuplicateTrackingCode(code) if code == "IPR-1"));

    let found = service.find_by_tracking_code("ipr-1").unwrap().unwrap();
    assert_eq!(found.id, created.id);
}

#[test]
fn unknown_patent_and_round_are_reported() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let missing = uuid::Uuid::new_v4();
    let err = service
        .complete_drafting(missing, &Actor::drafter("dana"), Slot::PS)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PatentNotFound(id) if id == missing));

    let patent = staffed(&service, "IPR-R");
    admin_do(&service, &patent, Action::SetExaminationActive(true));
    let err = service
        .complete_drafting(patent.id, &Actor::drafter("dana"), Slot::Round(3))
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownRound { sequence: 3, .. }));
}

#[test]
fn queues_follow_the_workflow() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let first = staffed(&service, "IPR-Q1");
    let second = staffed(&service, "IPR-Q2");
    for patent in [&first, &second] {
        admin_do(
            &service,
            patent,
            Action::SetGate {
                gate: Gate::IdfReceived,
                value: true,
            },
        );
    }

    let drafting = service.drafting_queue("dana").unwrap();
    let codes: Vec<&str> = drafting.iter().map(|t| t.tracking_code.as_str()).collect();
    assert_eq!(codes, vec!["IPR-Q1", "IPR-Q2"]);
    assert!(drafting.iter().all(|task| task.slot == Slot::PS));
    assert_eq!(drafting[0].deadline, Some(1_900_000_000_000));

    service
        .complete_drafting(first.id, &Actor::drafter("dana"), Slot::PS)
        .unwrap();

    assert_eq!(service.drafting_queue("dana").unwrap().len(), 1);
    let review = service.review_queue().unwrap();
    assert_eq!(review.len(), 1);
    assert_eq!(review[0].kind, TaskKind::Review(StageKind::Draft));

    let filing = service.filing_queue("farid").unwrap();
    assert_eq!(filing.len(), 1);
    assert_eq!(filing[0].patent_id, first.id);

    let next = service
        .next_task(first.id, &Actor::filer("farid"))
        .unwrap()
        .unwrap();
    assert_eq!(next.kind, TaskKind::Filing);

    admin_do(&service, &second, Action::SetWithdrawn(true));
    assert!(service.drafting_queue("dana").unwrap().is_empty());
}

#[test]
fn free_standing_events_are_appended_in_order() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let patent = staffed(&service, "IPR-E");

    let event = service
        .record_event(
            patent.id,
            EventKind::AssignmentUpdated,
            "deadline extended by phone",
            Some(&admin()),
            Some(42),
        )
        .unwrap();

    let events = service.timeline(patent.id).unwrap();
    assert_eq!(events.last(), Some(&event));
    assert_eq!(event.deadline_snapshot, Some(42));

    let err = service
        .record_event(
            uuid::Uuid::new_v4(),
            EventKind::GateUpdated,
            "orphan",
            None,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PatentNotFound(_)));
}

#[test]
fn overall_completion_requires_every_rollup() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let patent = staffed(&service, "IPR-DONE");
    for gate in [Gate::IdfReceived, Gate::CsDataSent, Gate::CsDataReceived] {
        admin_do(&service, &patent, Action::SetGate { gate, value: true });
    }
    let mark = TransitionRequest::new(admin(), Action::MarkOverallCompleted);
    assert!(service.apply(patent.id, &mark).is_err());

    finish_tracks(&service, &patent);

    admin_do(&service, &patent, Action::SetExaminationActive(true));
    let err = service.apply(patent.id, &mark).unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::PreconditionNotMet {
            missing: Prerequisite::ExaminationComplete,
            ..
        }
    ));

    admin_do(&service, &patent, Action::SetExaminationActive(false));
    let outcome = service.apply(patent.id, &mark).unwrap();
    assert!(outcome.patent.overall_completed);
    assert!(service.drafting_queue("dana").unwrap().is_empty());
}

#[test]
fn examination_round_runs_from_opening_to_overall_completion() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let patent = staffed(&service, "IPR-FER");
    finish_tracks(&service, &patent);
    admin_do(&service, &patent, Action::SetExaminationActive(true));

    let mark = TransitionRequest::new(admin(), Action::MarkOverallCompleted);
    let err = service.apply(patent.id, &mark).unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::PreconditionNotMet {
            missing: Prerequisite::ExaminationComplete,
            ..
        }
    ));

    let opened = service
        .apply(
            patent.id,
            &TransitionRequest::new(Actor::filer("farid"), Action::OpenExaminationRound),
        )
        .unwrap();
    assert_eq!(opened.patent.rounds.len(), 1);
    let round = Slot::Round(1);
    assign(&service, &patent, round, StageKind::Draft, "dana");
    assign(&service, &patent, round, StageKind::File, "farid");

    let drafter = Actor::drafter("dana");
    let filer = Actor::filer("farid");

    service.complete_drafting(patent.id, &drafter, round).unwrap();
    let rejected = service
        .reject_review(patent.id, &admin(), round, StageKind::Draft, "claims too broad")
        .unwrap();
    assert!(!rejected.patent.rounds[0].flags.drafting_done);
    assert!(rejected
        .event
        .as_ref()
        .unwrap()
        .description
        .contains("claims too broad"));

    service.complete_drafting(patent.id, &drafter, round).unwrap();
    service
        .approve_review(patent.id, &admin(), round, StageKind::Draft)
        .unwrap();

    let mut forms = FormFlags::new();
    forms.insert("form_18".to_string(), true);
    service
        .complete_filing(patent.id, &filer, round, forms)
        .unwrap();
    service
        .reject_review(patent.id, &admin(), round, StageKind::File, "missing annexure")
        .unwrap();
    let refiled = service
        .complete_filing(patent.id, &filer, round, FormFlags::new())
        .unwrap();
    assert!(!refiled.patent.rounds[0].complete);
    assert!(!refiled.patent.examination_completion);
    assert!(service.apply(patent.id, &mark).is_err());

    let approved = service
        .approve_review(patent.id, &admin(), round, StageKind::File)
        .unwrap();
    assert!(approved.patent.rounds[0].complete);
    assert!(approved.patent.examination_completion);

    let stored = service.get_patent(patent.id).unwrap();
    assert_eq!(stored, approved.patent);
    assert_eq!(stored.rounds[0].forms.get("form_18"), Some(&true));
    let stored_form: i64 = conn
        .query_row(
            "SELECT value FROM slot_form_flags
             WHERE patent_uuid = ?1 AND slot_key = ?2 AND form_name = 'form_18';",
            [patent.id.to_string(), round.storage_key()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored_form, 1);

    let completed = service.apply(patent.id, &mark).unwrap();
    assert!(completed.changed);
    assert!(completed.patent.overall_completed);

    let kinds: Vec<String> = service
        .timeline(patent.id)
        .unwrap()
        .into_iter()
        .map(|event| event.kind.as_str().to_string())
        .filter(|kind| kind.starts_with("fer_") || kind == "overall_completed")
        .collect();
    assert_eq!(
        kinds,
        vec![
            "fer_round_opened",
            "fer_draft_completed",
            "fer_draft_rejected",
            "fer_draft_completed",
            "fer_draft_approved",
            "fer_filing_completed",
            "fer_filing_rejected",
            "fer_filing_completed",
            "fer_filing_approved",
            "overall_completed",
        ]
    );
}

//! Integration tests for the full OAuth2 pipeline.
//!
//! Tests: Command → pre-command chain → aggregate → EventStore
//!
//! Verifies:
//! - Every outcome, rejections included, is persisted on the right stream
//! - Cross-aggregate checks stop commands before their aggregate is reached
//! - Optimistic concurrency conflicts are detected and resolved by retrying
//! - Replaying the persisted stream reproduces the state the handler saw

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    use tokenforge_auth::commands::{
        AuthorizeUserToOnBoardClientApplications, GrantUserAdministratorRole, OnBoardClientApplication, OnBoardUser,
        RequestAccessTokenViaClientCredentialsGrant, RequestAccessTokenViaImplicitGrant, RequestAccessTokenViaROPCGrant,
    };
    use tokenforge_auth::events::{ClientApplicationWasOnBoarded, UserWasGrantedAdministratorRole, UserWasOnBoarded};
    use tokenforge_auth::{
        ClientApplication, OAuthCommand, OAuthEvent, ResourceOwner, client_application_stream, resource_owner_stream,
    };
    use tokenforge_core::{Aggregate, ClientId, ExpectedVersion, StreamId, TokenGenerator, UserId};
    use tokenforge_events::{Command, DecodeEvent, Event};

    use crate::command_dispatcher::{CommandDispatcher, DispatchError, rehydrate};
    use crate::event_store::{EventStore, EventStoreError, EventStream, InMemoryEventStore, StoredEvent, UncommittedEvent};
    use crate::{DispatcherConfig, UuidTokenGenerator};

    const REDIRECT_URI: &str = "https://example.com/callback";

    #[derive(Default)]
    struct CountingTokens {
        issued: AtomicUsize,
    }

    impl TokenGenerator for CountingTokens {
        fn generate(&self) -> String {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            format!("token-{n}")
        }
    }

    type TestDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<CountingTokens>>;

    fn setup() -> (TestDispatcher, Arc<InMemoryEventStore>, Arc<CountingTokens>) {
        let store = Arc::new(InMemoryEventStore::new());
        let tokens = Arc::new(CountingTokens::default());
        let dispatcher = CommandDispatcher::with_default_handlers(Arc::clone(&store), Arc::clone(&tokens));
        (dispatcher, store, tokens)
    }

    fn seed(store: &dyn EventStore, events: Vec<OAuthEvent>) {
        let batch = events.iter().map(|e| UncommittedEvent::from_typed(e).unwrap()).collect();
        store.append(batch, ExpectedVersion::Any).unwrap();
    }

    /// Administrators cannot be created through commands; the first one is seeded.
    fn seed_admin(store: &dyn EventStore, id: &str) {
        seed(
            store,
            vec![
                UserWasOnBoarded {
                    user_id: UserId::new(id),
                    username: id.to_string(),
                    password_hash: tokenforge_auth::credentials::hash_password(&UserId::new(id), "root"),
                }
                .into(),
                UserWasGrantedAdministratorRole {
                    user_id: UserId::new(id),
                    granting_user_id: UserId::new(id),
                }
                .into(),
            ],
        );
    }

    fn seed_client(store: &dyn EventStore, secret: &str) {
        seed(
            store,
            vec![
                ClientApplicationWasOnBoarded {
                    client_id: ClientId::new("c1"),
                    client_secret: secret.to_string(),
                    redirect_uri: REDIRECT_URI.to_string(),
                    user_id: UserId::new("admin"),
                }
                .into(),
            ],
        );
    }

    fn persisted(store: &dyn EventStore, stream_id: &StreamId) -> Vec<OAuthEvent> {
        store
            .load_stream(stream_id)
            .unwrap()
            .map(|r| {
                let r = r.unwrap();
                OAuthEvent::decode(&r.event_type, &r.payload).unwrap().unwrap()
            })
            .collect()
    }

    fn onboard_user(id: &str, password: &str) -> OAuthCommand {
        OnBoardUser {
            user_id: UserId::new(id),
            username: id.to_string(),
            password: password.to_string(),
        }
        .into()
    }

    fn authorize_onboarding(user: &str, by: &str) -> OAuthCommand {
        AuthorizeUserToOnBoardClientApplications {
            user_id: UserId::new(user),
            authorizing_user_id: UserId::new(by),
        }
        .into()
    }

    fn onboard_client(user: &str, secret: &str) -> OAuthCommand {
        OnBoardClientApplication {
            client_id: ClientId::new("c1"),
            client_secret: secret.to_string(),
            redirect_uri: REDIRECT_URI.to_string(),
            user_id: UserId::new(user),
        }
        .into()
    }

    fn client_credentials(secret: &str) -> OAuthCommand {
        RequestAccessTokenViaClientCredentialsGrant {
            client_id: ClientId::new("c1"),
            client_secret: secret.to_string(),
        }
        .into()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Client Application flows
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn client_credentials_against_empty_stream_is_rejected_without_a_token() {
        let (dispatcher, store, tokens) = setup();

        let events = dispatcher.dispatch(&client_credentials("anything")).unwrap();

        let [OAuthEvent::RequestAccessTokenViaClientCredentialsGrantWasRejectedDueToInvalidClientApplicationID(e)] =
            events.as_slice()
        else {
            panic!("expected InvalidClientApplicationID, got {events:?}");
        };
        assert_eq!(e.client_id, ClientId::new("c1"));
        assert_eq!(tokens.issued.load(Ordering::SeqCst), 0);
        assert_eq!(persisted(&*store, &client_application_stream(&ClientId::new("c1"))), events);
    }

    #[test]
    fn client_credentials_checks_the_secret() {
        let (dispatcher, store, tokens) = setup();
        seed_client(&*store, "s3cr3t");

        let rejected = dispatcher.dispatch(&client_credentials("wrong")).unwrap();
        assert!(matches!(
            rejected.as_slice(),
            [OAuthEvent::RequestAccessTokenViaClientCredentialsGrantWasRejectedDueToInvalidClientApplicationSecret(_)]
        ));

        let issued = dispatcher.dispatch(&client_credentials("s3cr3t")).unwrap();
        let [OAuthEvent::AccessTokenWasIssuedToClientApplicationViaClientCredentialsGrant(e)] = issued.as_slice() else {
            panic!("expected an issued token, got {issued:?}");
        };
        assert!(!e.access_token.is_empty());
        assert_eq!(tokens.issued.load(Ordering::SeqCst), 1);
        assert_eq!(store.stream_len(&client_application_stream(&ClientId::new("c1"))).unwrap(), 3);
    }

    #[test]
    fn unauthorized_user_never_reaches_the_client_application() {
        let (dispatcher, store, _) = setup();
        dispatcher.dispatch(&onboard_user("u1", "pw")).unwrap();

        let events = dispatcher.dispatch(&onboard_client("u1", "s3cr3t")).unwrap();

        assert!(matches!(
            events.as_slice(),
            [OAuthEvent::OnBoardClientApplicationWasRejectedDueToUnAuthorizeUser(_)]
        ));
        let stream = persisted(&*store, &client_application_stream(&ClientId::new("c1")));
        assert_eq!(stream, events);
        assert!(!stream.iter().any(|e| matches!(e, OAuthEvent::ClientApplicationWasOnBoarded(_))));
    }

    #[test]
    fn insecure_redirect_uri_is_rejected_for_authorized_users() {
        let (dispatcher, store, _) = setup();
        seed_admin(&*store, "admin");
        dispatcher.dispatch(&onboard_user("u1", "pw")).unwrap();
        dispatcher.dispatch(&authorize_onboarding("u1", "admin")).unwrap();

        let command: OAuthCommand = OnBoardClientApplication {
            client_id: ClientId::new("c1"),
            client_secret: "s3cr3t".to_string(),
            redirect_uri: "http://example.com/callback".to_string(),
            user_id: UserId::new("u1"),
        }
        .into();
        let events = dispatcher.dispatch(&command).unwrap();

        assert!(matches!(
            events.as_slice(),
            [OAuthEvent::OnBoardClientApplicationWasRejectedDueToInsecureRedirectUri(_)]
        ));
    }

    #[test]
    fn full_onboarding_flow_and_replay_determinism() {
        let (dispatcher, store, _) = setup();
        seed_admin(&*store, "admin");

        dispatcher.dispatch(&onboard_user("u1", "pw")).unwrap();
        let authorized = dispatcher.dispatch(&authorize_onboarding("u1", "admin")).unwrap();
        assert!(matches!(
            authorized.as_slice(),
            [OAuthEvent::UserWasAuthorizedToOnBoardClientApplications(_)]
        ));

        let onboarded = dispatcher.dispatch(&onboard_client("u1", "s3cr3t")).unwrap();
        assert!(matches!(onboarded.as_slice(), [OAuthEvent::ClientApplicationWasOnBoarded(_)]));

        // The state the aggregate reached equals a fresh replay of what was stored.
        let stream = client_application_stream(&ClientId::new("c1"));
        let replayed = rehydrate::<ClientApplication, _>(&*store, &stream).unwrap();
        let handled = tokenforge_core::EventSourced::<ClientApplication>::reconstruct(&onboarded);
        assert_eq!(replayed.state(), handled.state());
        assert_eq!(replayed.state().onboarded_by(), Some(&UserId::new("u1")));
        assert_eq!(replayed.version(), 1);

        let user = rehydrate::<ResourceOwner, _>(&*store, &resource_owner_stream(&UserId::new("u1"))).unwrap();
        assert!(user.state().is_authorized_to_onboard_client_applications());
        assert!(!user.state().is_administrator());
    }

    /// Dispatch `command`, then check that the target aggregate's state (what it
    /// held before, plus the events this dispatch put on its stream) equals a
    /// fresh rehydration of the stored stream.
    fn dispatch_and_compare<A>(dispatcher: &TestDispatcher, store: &InMemoryEventStore, command: &OAuthCommand) -> Vec<OAuthEvent>
    where
        A: Aggregate<Event = OAuthEvent> + PartialEq,
    {
        let stream = command.target_stream_id();
        let before = rehydrate::<A, _>(store, &stream).unwrap();

        let events = dispatcher.dispatch(command).unwrap();
        let on_stream: Vec<&OAuthEvent> = events.iter().filter(|e| e.stream_id() == stream).collect();
        let handled = before.state().clone().replay(on_stream.iter().copied());

        let replayed = rehydrate::<A, _>(store, &stream).unwrap();
        assert_eq!(replayed.state(), &handled, "state diverged after {}", command.command_type());
        assert_eq!(replayed.version(), before.version() + on_stream.len() as u64);
        events
    }

    #[test]
    fn every_dispatch_matches_the_rehydrated_stream() {
        let (dispatcher, store, _) = setup();
        seed_admin(&*store, "admin");

        let onboarded = dispatch_and_compare::<ResourceOwner>(&dispatcher, &store, &onboard_user("u1", "hunter2"));
        assert!(matches!(onboarded.as_slice(), [OAuthEvent::UserWasOnBoarded(_)]));

        let grant: OAuthCommand = GrantUserAdministratorRole {
            user_id: UserId::new("u1"),
            granting_user_id: UserId::new("admin"),
        }
        .into();
        let granted = dispatch_and_compare::<ResourceOwner>(&dispatcher, &store, &grant);
        assert!(matches!(granted.as_slice(), [OAuthEvent::UserWasGrantedAdministratorRole(_)]));

        let authorized = dispatch_and_compare::<ResourceOwner>(&dispatcher, &store, &authorize_onboarding("u1", "admin"));
        assert!(matches!(
            authorized.as_slice(),
            [OAuthEvent::UserWasAuthorizedToOnBoardClientApplications(_)]
        ));

        let client = dispatch_and_compare::<ClientApplication>(&dispatcher, &store, &onboard_client("u1", "s3cr3t"));
        assert!(matches!(client.as_slice(), [OAuthEvent::ClientApplicationWasOnBoarded(_)]));

        let ropc = |client_secret: &str| -> OAuthCommand {
            RequestAccessTokenViaROPCGrant {
                user_id: UserId::new("u1"),
                client_id: ClientId::new("c1"),
                client_secret: client_secret.to_string(),
                username: "u1".to_string(),
                password: "hunter2".to_string(),
                scope: "read_write".to_string(),
            }
            .into()
        };

        // Causally dependent pair: access token, then refresh token, in one batch.
        let issued = dispatch_and_compare::<ResourceOwner>(&dispatcher, &store, &ropc("s3cr3t"));
        assert!(matches!(
            issued.as_slice(),
            [
                OAuthEvent::AccessTokenWasIssuedToUserViaROPCGrant(_),
                OAuthEvent::RefreshTokenWasIssuedToUserViaROPCGrant(_),
            ]
        ));

        // A pre-command rejection lands on the same stream and must replay too.
        let rejected = dispatch_and_compare::<ResourceOwner>(&dispatcher, &store, &ropc("wrong"));
        assert!(matches!(
            rejected.as_slice(),
            [OAuthEvent::RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidClientApplicationCredentials(_)]
        ));

        let user = rehydrate::<ResourceOwner, _>(&*store, &resource_owner_stream(&UserId::new("u1"))).unwrap();
        assert!(user.state().is_administrator());
        assert!(user.state().is_authorized_to_onboard_client_applications());
        assert_eq!(user.version(), 6);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Resource Owner flows
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn only_administrators_grant_administrator_role() {
        let (dispatcher, store, _) = setup();
        seed_admin(&*store, "admin");
        dispatcher.dispatch(&onboard_user("u1", "pw")).unwrap();
        dispatcher.dispatch(&onboard_user("u2", "pw")).unwrap();

        let grant = |user: &str, by: &str| -> OAuthCommand {
            GrantUserAdministratorRole {
                user_id: UserId::new(user),
                granting_user_id: UserId::new(by),
            }
            .into()
        };

        let denied = dispatcher.dispatch(&grant("u2", "u1")).unwrap();
        assert!(matches!(
            denied.as_slice(),
            [OAuthEvent::GrantUserAdministratorRoleWasRejectedDueToNonAdministrator(_)]
        ));

        let missing_target = dispatcher.dispatch(&grant("ghost", "admin")).unwrap();
        assert!(matches!(
            missing_target.as_slice(),
            [OAuthEvent::GrantUserAdministratorRoleWasRejectedDueToMissingTargetUser(_)]
        ));

        let granted = dispatcher.dispatch(&grant("u2", "admin")).unwrap();
        assert!(matches!(granted.as_slice(), [OAuthEvent::UserWasGrantedAdministratorRole(_)]));

        // The rejection landed on the target's stream, before the grant.
        let stream = persisted(&*store, &resource_owner_stream(&UserId::new("u2")));
        assert_eq!(stream.len(), 3);
        assert!(stream[1].is_rejection());
    }

    #[test]
    fn ropc_grant_through_the_pipeline() {
        let (dispatcher, store, tokens) = setup();
        seed_client(&*store, "s3cr3t");
        dispatcher.dispatch(&onboard_user("u1", "hunter2")).unwrap();

        let ropc = |client_secret: &str, password: &str| -> OAuthCommand {
            RequestAccessTokenViaROPCGrant {
                user_id: UserId::new("u1"),
                client_id: ClientId::new("c1"),
                client_secret: client_secret.to_string(),
                username: "u1".to_string(),
                password: password.to_string(),
                scope: "read_write".to_string(),
            }
            .into()
        };

        let bad_client = dispatcher.dispatch(&ropc("wrong", "hunter2")).unwrap();
        assert!(matches!(
            bad_client.as_slice(),
            [OAuthEvent::RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidClientApplicationCredentials(_)]
        ));

        let bad_user = dispatcher.dispatch(&ropc("s3cr3t", "nope")).unwrap();
        assert!(matches!(
            bad_user.as_slice(),
            [OAuthEvent::RequestAccessTokenViaROPCGrantWasRejectedDueToInvalidUserCredentials(_)]
        ));
        assert_eq!(tokens.issued.load(Ordering::SeqCst), 0);

        let issued = dispatcher.dispatch(&ropc("s3cr3t", "hunter2")).unwrap();
        assert!(matches!(
            issued.as_slice(),
            [
                OAuthEvent::AccessTokenWasIssuedToUserViaROPCGrant(_),
                OAuthEvent::RefreshTokenWasIssuedToUserViaROPCGrant(_),
            ]
        ));
        assert_eq!(tokens.issued.load(Ordering::SeqCst), 2);

        // Client-side rejections are recorded on the user's stream.
        assert!(persisted(&*store, &client_application_stream(&ClientId::new("c1"))).len() == 1);
        assert_eq!(persisted(&*store, &resource_owner_stream(&UserId::new("u1"))).len(), 5);
    }

    #[test]
    fn implicit_grant_requires_the_registered_redirect_uri() {
        let (dispatcher, store, _) = setup();
        seed_client(&*store, "s3cr3t");
        dispatcher.dispatch(&onboard_user("u1", "hunter2")).unwrap();

        let implicit = |redirect_uri: &str| -> OAuthCommand {
            RequestAccessTokenViaImplicitGrant {
                user_id: UserId::new("u1"),
                client_id: ClientId::new("c1"),
                redirect_uri: redirect_uri.to_string(),
                username: "u1".to_string(),
                password: "hunter2".to_string(),
            }
            .into()
        };

        let rejected = dispatcher.dispatch(&implicit("https://attacker.example.com/")).unwrap();
        assert!(matches!(
            rejected.as_slice(),
            [OAuthEvent::RequestAccessTokenViaImplicitGrantWasRejectedDueToInvalidClientApplicationRedirectUri(_)]
        ));

        let issued = dispatcher.dispatch(&implicit(REDIRECT_URI)).unwrap();
        assert!(matches!(issued.as_slice(), [OAuthEvent::AccessTokenWasIssuedToUserViaImplicitGrant(_)]));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Concurrency and failure
    // ─────────────────────────────────────────────────────────────────────

    /// Holds the first `armed` client-application loads at a barrier, after
    /// they have read the stream, so two dispatches judge the same history.
    struct GatedStore {
        inner: InMemoryEventStore,
        gate: Barrier,
        armed: AtomicUsize,
    }

    impl GatedStore {
        fn new(racers: usize) -> Self {
            Self {
                inner: InMemoryEventStore::new(),
                gate: Barrier::new(racers),
                armed: AtomicUsize::new(racers),
            }
        }
    }

    impl EventStore for GatedStore {
        fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.append(events, expected_version)
        }

        fn load_stream(&self, stream_id: &StreamId) -> Result<EventStream<'_>, EventStoreError> {
            let records: Vec<_> = self.inner.load_stream(stream_id)?.collect();
            let gated = stream_id.as_str().starts_with("client-application-")
                && self
                    .armed
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
            if gated {
                self.gate.wait();
            }
            Ok(Box::new(records.into_iter()))
        }
    }

    fn racing_setup() -> (CommandDispatcher<Arc<GatedStore>, UuidTokenGenerator>, Arc<GatedStore>) {
        let store = Arc::new(GatedStore::new(2));
        seed_admin(&*store, "admin");
        seed(
            &*store,
            vec![
                UserWasOnBoarded {
                    user_id: UserId::new("u1"),
                    username: "u1".to_string(),
                    password_hash: "h".to_string(),
                }
                .into(),
                tokenforge_auth::events::UserWasAuthorizedToOnBoardClientApplications {
                    user_id: UserId::new("u1"),
                    authorizing_user_id: UserId::new("admin"),
                }
                .into(),
            ],
        );
        let dispatcher = CommandDispatcher::with_default_handlers(Arc::clone(&store), UuidTokenGenerator::new());
        (dispatcher, store)
    }

    fn count_onboarded(store: &dyn EventStore) -> usize {
        persisted(store, &client_application_stream(&ClientId::new("c1")))
            .iter()
            .filter(|e| matches!(e, OAuthEvent::ClientApplicationWasOnBoarded(_)))
            .count()
    }

    #[test]
    fn concurrent_onboarding_commits_at_most_once() {
        let (dispatcher, store) = racing_setup();
        let commands = [onboard_client("u1", "first"), onboard_client("u1", "second")];

        let results: Vec<Result<Vec<OAuthEvent>, DispatchError>> = std::thread::scope(|s| {
            let dispatcher = &dispatcher;
            let handles: Vec<_> = commands.iter().map(|c| s.spawn(move || dispatcher.dispatch(c))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        let losers: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| matches!(r, Err(DispatchError::Concurrency(_))))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(winners, 1);
        assert_eq!(losers.len(), 1);
        assert_eq!(count_onboarded(&*store), 1);

        // Re-dispatching the loser sees the client already onboarded.
        let retried = dispatcher.dispatch(&commands[losers[0]]).unwrap();
        assert!(matches!(
            retried.as_slice(),
            [OAuthEvent::OnBoardClientApplicationWasRejectedDueToExistingClientApplication(_)]
        ));
        assert_eq!(count_onboarded(&*store), 1);
    }

    #[test]
    fn dispatch_with_retry_resolves_the_conflict() {
        let (dispatcher, store) = racing_setup();
        let dispatcher = dispatcher.with_config(DispatcherConfig::default().with_max_conflict_retries(1));
        let commands = [onboard_client("u1", "first"), onboard_client("u1", "second")];

        let results: Vec<Vec<OAuthEvent>> = std::thread::scope(|s| {
            let dispatcher = &dispatcher;
            let handles: Vec<_> = commands
                .iter()
                .map(|c| s.spawn(move || dispatcher.dispatch_with_retry(c)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
        });

        let onboarded = results
            .iter()
            .filter(|r| matches!(r.as_slice(), [OAuthEvent::ClientApplicationWasOnBoarded(_)]))
            .count();
        let existing = results
            .iter()
            .filter(|r| {
                matches!(
                    r.as_slice(),
                    [OAuthEvent::OnBoardClientApplicationWasRejectedDueToExistingClientApplication(_)]
                )
            })
            .count();
        assert_eq!((onboarded, existing), (1, 1));
        assert_eq!(count_onboarded(&*store), 1);
    }

    /// Reads work; every append reports the store as gone.
    struct UnavailableStore(InMemoryEventStore);

    impl EventStore for UnavailableStore {
        fn append(&self, _: Vec<UncommittedEvent>, _: ExpectedVersion) -> Result<Vec<StoredEvent>, EventStoreError> {
            Err(EventStoreError::Unavailable("operation cancelled".to_string()))
        }

        fn load_stream(&self, stream_id: &StreamId) -> Result<EventStream<'_>, EventStoreError> {
            self.0.load_stream(stream_id)
        }
    }

    #[test]
    fn unavailable_store_aborts_the_dispatch() {
        let store = Arc::new(UnavailableStore(InMemoryEventStore::new()));
        let dispatcher = CommandDispatcher::with_default_handlers(Arc::clone(&store), UuidTokenGenerator::new());

        let err = dispatcher.dispatch(&onboard_user("u1", "pw")).unwrap_err();

        assert!(matches!(err, DispatchError::Store(EventStoreError::Unavailable(_))));
        assert_eq!(store.0.stream_len(&resource_owner_stream(&UserId::new("u1"))).unwrap(), 0);
    }
}

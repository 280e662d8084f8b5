pub mod ai;
pub mod flavor;
pub mod game;
pub mod net;
pub mod utils;

use std::fmt::Display;
use std::str::FromStr;

use gloo_timers::future::TimeoutFuture;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::{Function, Promise};

pub use ai::{AiAgent, AiConfig, AiDecision, AiStep, GameAction};
pub use flavor::{
    CardLineRequest, Commentator, FlavorError, FlavorSource, HintRequest, ProvidedText,
};
pub use game::{
    apply_intent, catalog, Ability, BattleConfig, BattleEvent, BattlePhase, BattleSetup,
    BattleState, Card, CardEffect, CardId, CardType, Champion, Combatant, EffectDeltas,
    IntegrityError, Intent, Realm, RuleError, Side, Transition,
};
pub use net::{
    ChannelError, LobbyStatus, PeerChannel, PeerError, PeerMessage, PeerRole, PeerSession,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    utils::init_logging();
}

/// Options accepted by the JS constructors; every field may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub battle: BattleConfig,
    pub ai: AiConfig,
}

impl EngineConfig {
    fn from_json(json: Option<String>) -> Result<Self, JsValue> {
        match json {
            Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error),
            None => Ok(Self::default()),
        }
    }
}

fn make_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    }
}

fn to_js_error<E: Serialize + Display>(error: E) -> JsValue {
    to_value(&error).unwrap_or_else(|_| JsValue::from_str(&error.to_string()))
}

fn serde_to_js_error<E: Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn no_battle() -> JsValue {
    JsValue::from_str("no battle in progress")
}

fn lookup_champion(id: &str) -> Result<Champion, JsValue> {
    catalog::champion_by_id(id)
        .cloned()
        .ok_or_else(|| to_js_error(RuleError::UnknownChampion { id: id.to_owned() }))
}

fn parse_deck(deck_json: &str, deck_size: u8) -> Result<Vec<Card>, JsValue> {
    let ids: Vec<CardId> = serde_json::from_str(deck_json).map_err(serde_to_js_error)?;
    catalog::build_deck(&ids, deck_size).map_err(to_js_error)
}

#[derive(Serialize)]
struct OpponentStepResponse<'a> {
    decision: &'a AiDecision,
    transition: &'a Transition,
}

#[derive(Serialize)]
struct OpponentTurnResponse<'a> {
    steps: &'a [AiStep],
    state: &'a BattleState,
}

/// Single-player battle against the scripted opponent.
#[wasm_bindgen]
pub struct GameEngine {
    config: EngineConfig,
    state: Option<BattleState>,
    rng: SmallRng,
    agent: AiAgent,
    commentator: Commentator,
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<GameEngine, JsValue> {
        let config = EngineConfig::from_json(config_json)?;
        let seed = config.battle.seed;
        Ok(GameEngine {
            rng: make_rng(seed),
            agent: AiAgent::new(config.ai.clone()),
            commentator: Commentator::new(seed),
            state: None,
            config,
        })
    }

    /// Starts a battle. `deck_json` is a JSON array of catalog card ids; the
    /// opponent gets a random other champion unless one is named.
    pub fn start_battle(
        &mut self,
        champion_id: &str,
        deck_json: &str,
        opponent_champion_id: Option<String>,
    ) -> Result<String, JsValue> {
        let battle_config = &self.config.battle;
        let champion = lookup_champion(champion_id)?;
        let deck = parse_deck(deck_json, battle_config.deck_size)?;

        let opponent = match opponent_champion_id {
            Some(id) => lookup_champion(&id)?,
            None => {
                let others: Vec<&Champion> = catalog::champions()
                    .iter()
                    .filter(|candidate| candidate.id != champion.id)
                    .collect();
                others
                    .choose(&mut self.rng)
                    .map(|candidate| (*candidate).clone())
                    .ok_or_else(|| JsValue::from_str("no opponent champion available"))?
            }
        };
        let opponent_deck = catalog::starter_deck(opponent.realm);

        let player = BattleSetup::new(champion, deck, battle_config).map_err(to_js_error)?;
        let opponent =
            BattleSetup::new(opponent, opponent_deck, battle_config).map_err(to_js_error)?;
        let state = BattleState::new(player, opponent, Side::Player, battle_config, &mut self.rng);
        let json = serde_json::to_string(&state).map_err(serde_to_js_error)?;
        self.state = Some(state);
        Ok(json)
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        let state = self.state.as_ref().ok_or_else(no_battle)?;
        serde_json::to_string(state).map_err(serde_to_js_error)
    }

    pub fn play_card(&mut self, card_id: u32) -> Result<String, JsValue> {
        self.transition(Intent::PlayCard {
            side: Side::Player,
            card_id,
        })
    }

    pub fn use_ability(&mut self) -> Result<String, JsValue> {
        self.transition(Intent::UseAbility { side: Side::Player })
    }

    pub fn end_turn(&mut self) -> Result<String, JsValue> {
        self.transition(Intent::EndTurn { side: Side::Player })
    }

    /// Decides and applies one opponent action so the front end can pace the turn.
    pub fn opponent_step(&mut self) -> Result<String, JsValue> {
        let state = self.state.take().ok_or_else(no_battle)?;
        let decision = self.agent.decide_action(&state, Side::Opponent);
        let transition = apply_intent(state, decision.action.clone().into_intent(Side::Opponent));
        let json = serde_json::to_string(&OpponentStepResponse {
            decision: &decision,
            transition: &transition,
        })
        .map_err(serde_to_js_error);
        self.state = Some(transition.state);
        json
    }

    /// Runs the opponent's whole turn with no pacing.
    pub fn run_opponent_turn(&mut self) -> Result<String, JsValue> {
        let state = self.state.as_mut().ok_or_else(no_battle)?;
        let steps = self.agent.play_turn(state, Side::Opponent);
        serde_json::to_string(&OpponentTurnResponse {
            steps: &steps,
            state,
        })
        .map_err(serde_to_js_error)
    }

    /// Resolves to the opponent's next decision (JSON) after `delay_ms`. The
    /// decision is computed on a snapshot; apply it with `apply_opponent_action`.
    pub fn think_opponent(&self, delay_ms: Option<u32>) -> Promise {
        let Some(state) = self.state.clone() else {
            return Promise::reject(&no_battle());
        };
        let agent = self.agent.clone();
        let delay = delay_ms.unwrap_or(0);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let decision = agent.decide_action(&state, Side::Opponent);
            let json = serde_json::to_string(&decision).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn apply_opponent_action(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: GameAction = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        self.transition(action.into_intent(Side::Opponent))
    }

    /// A commentary line for a played card; `external` is the generator's
    /// answer, if it produced one in time.
    pub fn card_line(
        &mut self,
        card_id: u32,
        side: &str,
        external: Option<String>,
    ) -> Result<String, JsValue> {
        let card = catalog::card_by_id(card_id)
            .ok_or_else(|| to_js_error(RuleError::UnknownCard { card_id }))?;
        let side = Side::from_str(side).map_err(|_| JsValue::from_str("unknown side"))?;
        let request = CardLineRequest {
            card_name: &card.name,
            realm: card.realm,
            side,
        };
        let mut source = ProvidedText(external);
        Ok(self.commentator.card_line(Some(&mut source), &request))
    }

    pub fn tactical_hint(&mut self, external: Option<String>) -> Result<String, JsValue> {
        let state = self.state.as_ref().ok_or_else(no_battle)?;
        let request = HintRequest {
            hand: &state.player.hand,
            opponent_health: state.opponent.health,
            mana: state.player.mana,
        };
        let mut source = ProvidedText(external);
        Ok(self.commentator.tactical_hint(Some(&mut source), &request))
    }

    fn transition(&mut self, intent: Intent) -> Result<String, JsValue> {
        let state = self.state.take().ok_or_else(no_battle)?;
        let transition = apply_intent(state, intent);
        let json = serde_json::to_string(&transition).map_err(serde_to_js_error);
        self.state = Some(transition.state);
        json
    }
}

struct JsPeerChannel {
    callback: Function,
}

impl PeerChannel for JsPeerChannel {
    fn send(&mut self, payload: &str) -> Result<(), ChannelError> {
        self.callback
            .call1(&JsValue::NULL, &JsValue::from_str(payload))
            .map(|_| ())
            .map_err(|error| {
                ChannelError::new(error.as_string().unwrap_or_else(|| format!("{error:?}")))
            })
    }
}

#[derive(Serialize)]
struct PeerUpdate<'a> {
    status: &'a LobbyStatus,
    events: Vec<BattleEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<PeerError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a BattleState>,
}

/// Online battle against a remote human. The JS side owns the peer
/// connection: it forwards channel events here and sends whatever payload the
/// `send` callback receives.
#[wasm_bindgen]
pub struct PeerLink {
    session: PeerSession<JsPeerChannel>,
    deck: Vec<Card>,
    config: BattleConfig,
    rng: SmallRng,
    state: Option<BattleState>,
}

impl PeerLink {
    fn build(
        session: impl FnOnce(JsPeerChannel, Champion) -> PeerSession<JsPeerChannel>,
        send: Function,
        champion_id: &str,
        deck_json: &str,
        config_json: Option<String>,
    ) -> Result<PeerLink, JsValue> {
        let config = EngineConfig::from_json(config_json)?.battle;
        let champion = lookup_champion(champion_id)?;
        let deck = parse_deck(deck_json, config.deck_size)?;
        Ok(PeerLink {
            session: session(JsPeerChannel { callback: send }, champion),
            deck,
            rng: make_rng(config.seed),
            config,
            state: None,
        })
    }

    fn update(
        &self,
        events: Vec<BattleEvent>,
        error: Option<PeerError>,
    ) -> Result<String, JsValue> {
        serde_json::to_string(&PeerUpdate {
            status: self.session.status(),
            events,
            error,
            state: self.state.as_ref(),
        })
        .map_err(serde_to_js_error)
    }

    fn finish(&self, result: Result<Vec<BattleEvent>, PeerError>) -> Result<String, JsValue> {
        match result {
            Ok(events) => self.update(events, None),
            Err(error) => self.update(Vec::new(), Some(error)),
        }
    }
}

#[wasm_bindgen]
impl PeerLink {
    pub fn host(
        send: Function,
        champion_id: &str,
        deck_json: &str,
        config_json: Option<String>,
    ) -> Result<PeerLink, JsValue> {
        Self::build(PeerSession::host, send, champion_id, deck_json, config_json)
    }

    pub fn join(
        send: Function,
        champion_id: &str,
        deck_json: &str,
        peer_id: String,
        config_json: Option<String>,
    ) -> Result<PeerLink, JsValue> {
        Self::build(
            move |channel, champion| PeerSession::guest(channel, champion, peer_id),
            send,
            champion_id,
            deck_json,
            config_json,
        )
    }

    pub fn status_json(&self) -> Result<String, JsValue> {
        self.update(Vec::new(), None)
    }

    pub fn on_open(&mut self) -> Result<String, JsValue> {
        let result = self.session.on_open().map(|_| Vec::new());
        self.finish(result)
    }

    pub fn on_data(&mut self, payload: &str) -> Result<String, JsValue> {
        let result = self.session.on_data(self.state.as_mut(), payload);
        self.finish(result)
    }

    pub fn on_error(&mut self, message: String) -> Result<String, JsValue> {
        self.session.on_error(message);
        self.update(Vec::new(), None)
    }

    pub fn on_close(&mut self) -> Result<String, JsValue> {
        self.session.on_close();
        self.update(Vec::new(), None)
    }

    pub fn dismiss(&mut self) -> Result<String, JsValue> {
        self.session.dismiss();
        self.state = None;
        self.update(Vec::new(), None)
    }

    pub fn start_battle(&mut self) -> Result<String, JsValue> {
        let result = self
            .session
            .start_battle(self.deck.clone(), &self.config, &mut self.rng)
            .map(|(state, replayed)| {
                self.state = Some(state);
                replayed
            });
        self.finish(result)
    }

    pub fn play_card(&mut self, card_id: u32) -> Result<String, JsValue> {
        let result = match self.state.as_mut() {
            Some(state) => self.session.play_card(state, card_id),
            None => Err(PeerError::NotInBattle),
        };
        self.finish(result)
    }

    pub fn use_ability(&mut self) -> Result<String, JsValue> {
        let result = match self.state.as_mut() {
            Some(state) => self.session.use_ability(state),
            None => Err(PeerError::NotInBattle),
        };
        self.finish(result)
    }

    pub fn end_turn(&mut self) -> Result<String, JsValue> {
        let result = match self.state.as_mut() {
            Some(state) => self.session.end_turn(state),
            None => Err(PeerError::NotInBattle),
        };
        self.finish(result)
    }
}

#[wasm_bindgen(js_name = "catalogCards")]
pub fn catalog_cards() -> Result<JsValue, JsValue> {
    to_value(catalog::cards()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "catalogChampions")]
pub fn catalog_champions() -> Result<JsValue, JsValue> {
    to_value(catalog::champions()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateDeck")]
pub fn validate_deck(ids: JsValue) -> Result<(), JsValue> {
    let ids: Vec<CardId> = from_value(ids).map_err(JsValue::from)?;
    catalog::build_deck(&ids, BattleConfig::default().deck_size)
        .map(|_| ())
        .map_err(to_js_error)
}

/// Stateless form of the intent handler: state in, transition out.
#[wasm_bindgen(js_name = "applyIntent")]
pub fn apply_intent_js(state: JsValue, intent: JsValue) -> Result<JsValue, JsValue> {
    let state: BattleState = from_value(state).map_err(JsValue::from)?;
    let intent: Intent = from_value(intent).map_err(JsValue::from)?;
    to_value(&apply_intent(state, intent)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "computeOpponentMove")]
pub fn compute_opponent_move(state: JsValue, config: JsValue) -> Result<JsValue, JsValue> {
    let state: BattleState = from_value(state).map_err(JsValue::from)?;
    let config: AiConfig = if config.is_undefined() || config.is_null() {
        AiConfig::default()
    } else {
        from_value(config).map_err(JsValue::from)?
    };
    let decision = AiAgent::new(config).decide_action(&state, Side::Opponent);
    to_value(&decision).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: BattleState = from_value(state).map_err(JsValue::from)?;
    state.integrity_check().map_err(|error| {
        to_value(&error).unwrap_or_else(|_| JsValue::from_str("integrity violation"))
    })
}

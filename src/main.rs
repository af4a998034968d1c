//! Demo duel binary
//!
//! Runs a scripted two-player game with a small built-in catalog and prints
//! the log. Useful for eyeballing engine behavior; the real surface is the
//! library.

use clap::Parser;
use manastack::catalog::{
    AbilityCost, ActivatedAbility, CardCatalog, CardDefinition, StaticAbility, TriggerCondition,
    TriggeredAbility,
};
use manastack::core::{BoardScope, Effect, Keyword, LayerKind, PlayerId, TargetFilter};
use manastack::game::{
    game_loop::stock_library, GameLogger, GameLoop, GameState, ProviderPair, ScriptedProvider,
    VerbosityLevel,
};
use manastack::Result;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct VerbosityArg(VerbosityLevel);

impl std::str::FromStr for VerbosityArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "0" => Ok(VerbosityArg(VerbosityLevel::Silent)),
            "minimal" | "1" => Ok(VerbosityArg(VerbosityLevel::Minimal)),
            "normal" | "2" => Ok(VerbosityArg(VerbosityLevel::Normal)),
            "verbose" | "3" => Ok(VerbosityArg(VerbosityLevel::Verbose)),
            _ => Err(format!(
                "invalid verbosity '{s}' (expected: silent/0, minimal/1, normal/2, verbose/3)"
            )),
        }
    }
}

/// Scripted demo duel.
#[derive(Parser)]
#[command(name = "manastack")]
#[command(about = "manastack - scripted demo duel", long_about = None)]
struct Cli {
    /// RNG seed for shuffles
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Turn cap before the game is called a draw
    #[arg(long, default_value_t = 30)]
    max_turns: u32,

    /// Log verbosity (silent/minimal/normal/verbose or 0-3)
    #[arg(long, default_value = "normal")]
    verbosity: VerbosityArg,

    /// Comma-separated index script for player 1
    #[arg(long, value_delimiter = ',')]
    script1: Vec<usize>,

    /// Comma-separated index script for player 2
    #[arg(long, value_delimiter = ',')]
    script2: Vec<usize>,
}

/// A small catalog exercising most of the engine: vanilla and keyword
/// creatures, burn, an anthem, an aura, echo, and a planeswalker.
fn demo_catalog() -> CardCatalog {
    let mut catalog = CardCatalog::with_basic_lands();
    catalog.register(CardDefinition::creature("Grizzly Bears", "1G", 2, 2).unwrap());
    catalog.register(
        CardDefinition::creature("Serra Angel", "3WW", 4, 4)
            .unwrap()
            .with_keyword(Keyword::Flying)
            .with_keyword(Keyword::Vigilance),
    );
    catalog.register(
        CardDefinition::creature("Giant Spider", "3G", 2, 4)
            .unwrap()
            .with_keyword(Keyword::Reach),
    );
    catalog.register(
        CardDefinition::instant("Lightning Bolt", "R", vec![Effect::DealDamage { amount: 3 }])
            .unwrap(),
    );
    catalog.register(
        CardDefinition::sorcery("Divination", "2U", vec![Effect::DrawCards { count: 2 }]).unwrap(),
    );
    catalog.register(
        CardDefinition::enchantment("Glorious Anthem", "1WW")
            .unwrap()
            .with_static(StaticAbility::new(
                LayerKind::PtModify {
                    power: 1,
                    toughness: 1,
                },
                BoardScope::own_creatures(),
                "creatures you control get +1/+1",
            )),
    );
    catalog.register(
        CardDefinition::aura("Pacifism", "1W", TargetFilter::Creature)
            .unwrap()
            .with_static(StaticAbility::new(
                LayerKind::AbilityGrant {
                    add: smallvec::smallvec![Keyword::Defender],
                    remove: smallvec::SmallVec::new(),
                },
                BoardScope::all_creatures(),
                "enchanted creature cannot attack",
            )),
    );
    catalog.register(
        CardDefinition::creature("Deranged Hermit", "3GG", 1, 1)
            .unwrap()
            .with_echo("3GG")
            .unwrap()
            .with_triggered(TriggeredAbility::new(
                TriggerCondition::SelfEntersBattlefield,
                vec![
                    Effect::CreateToken {
                        name: "Squirrel".into(),
                    },
                    Effect::CreateToken {
                        name: "Squirrel".into(),
                    },
                ],
                "create two Squirrel tokens",
            )),
    );
    catalog.register(CardDefinition::token("Squirrel", 1, 1).with_subtype("Squirrel"));
    catalog.register(
        CardDefinition::planeswalker("Chandra, Pyre", "3RR", 4)
            .unwrap()
            .with_activated(ActivatedAbility::new(
                AbilityCost {
                    tap: false,
                    mana: None,
                    loyalty: Some(-2),
                },
                vec![Effect::DealDamage { amount: 2 }],
                "-2: deal 2 damage to any target",
            )),
    );
    catalog
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let catalog = Arc::new(demo_catalog());
    let mut game = GameState::new(catalog, "Alice", "Bob", cli.seed);
    game.logger = GameLogger::with_verbosity(cli.verbosity.0);

    let p0 = PlayerId::new(0);
    let p1 = PlayerId::new(1);
    let deck: &[(&str, usize)] = &[
        ("Forest", 8),
        ("Mountain", 4),
        ("Plains", 4),
        ("Grizzly Bears", 6),
        ("Giant Spider", 3),
        ("Lightning Bolt", 4),
        ("Glorious Anthem", 2),
        ("Deranged Hermit", 2),
    ];
    stock_library(&mut game, p0, deck)?;
    stock_library(&mut game, p1, deck)?;

    let mut a = ScriptedProvider::new(p0, cli.script1);
    let mut b = ScriptedProvider::new(p1, cli.script2);
    let providers = ProviderPair::new(&mut a, &mut b);

    let result = GameLoop::new(&mut game, providers)
        .with_max_turns(cli.max_turns)
        .run()?;

    match result.winner {
        Some(winner) => println!(
            "winner: {} on turn {} ({:?})",
            game.player(winner)?.name.as_str(),
            result.turns,
            result.reason
        ),
        None => println!("draw after {} turns ({:?})", result.turns, result.reason),
    }
    Ok(())
}

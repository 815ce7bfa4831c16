//! Hook groups and the built-in ad/analytics SDK signatures.

use crate::filter::MethodFilter;
use crate::neutralize::Neutralization;
use crate::target::OverrideValue;
use hs_discovery::{Modifiers, ReturnKind, ScanPredicate};

/// A named discovery key suffix with its predicate, filter and neutralization
#[derive(Debug, Clone)]
pub struct HookGroup {
    pub name: String,
    pub predicate: ScanPredicate,
    pub filter: MethodFilter,
    pub neutralization: Neutralization,
}

impl HookGroup {
    pub fn new(
        name: impl Into<String>,
        predicate: ScanPredicate,
        filter: MethodFilter,
        neutralization: Neutralization,
    ) -> Self {
        Self {
            name: name.into(),
            predicate,
            filter,
            neutralization,
        }
    }
}

pub const PANGOLIN_INIT: &str = "pangolin_init";
pub const GDT_INIT: &str = "gdt_init";
pub const ANYTHINK_SDK: &str = "anythink_sdk";
pub const IQIYI_UPGRADE: &str = "iqiyi_upgrade";
pub const FIREBASE_INIT: &str = "firebase_init";
pub const FLAGS_INIT: &str = "flags_init";
pub const AD_PACKAGES: &str = "ad_packages";

/// SDK packages whose public void entry points are replaced with no-ops
pub const AD_SDK_PACKAGES: &[&str] = &[
    "com.applovin",
    "com.anythink",
    "com.facebook.ads",
    "com.fyber.inneractive.sdk",
    "com.google.android.gms.ads",
    "com.mbridge.msdk",
    "com.inmobi.ads",
    "com.miniclip.ads",
    "com.smaato.sdk",
    "com.tp.adx",
    "com.tradplus.ads",
    "com.unity3d.services",
    "com.unity3d.ads",
    "com.vungle.warren",
    "com.bytedance.sdk",
];

pub const AD_ENTRY_POINTS: &[&str] = &[
    "loadAd",
    "loadAds",
    "load",
    "show",
    "fetchAd",
    "initSDK",
    "initialize",
    "initializeSdk",
];

/// Names of every built-in group, in install order
pub const BUILTIN_GROUP_NAMES: &[&str] = &[
    PANGOLIN_INIT,
    GDT_INIT,
    ANYTHINK_SDK,
    IQIYI_UPGRADE,
    FIREBASE_INIT,
    FLAGS_INIT,
    AD_PACKAGES,
];

/// The built-in groups, in install order
pub fn builtin_groups(suppress_original: bool) -> Vec<HookGroup> {
    vec![
        HookGroup::new(
            PANGOLIN_INIT,
            ScanPredicate::class_methods("com.bytedance.sdk.openadsdk.TTAdSdk", "init"),
            MethodFilter::any(),
            Neutralization::by_return_kind(suppress_original),
        ),
        HookGroup::new(
            GDT_INIT,
            ScanPredicate::using_strings([
                "SDK 尚未初始化，请在 Application 中调用 GDTAdSdk.initWithoutStart() 初始化",
            ]),
            MethodFilter::any(),
            Neutralization::fixed(OverrideValue::Bool(false), suppress_original),
        ),
        HookGroup::new(
            ANYTHINK_SDK,
            ScanPredicate::using_strings(["anythink_sdk"]),
            MethodFilter::any(),
            Neutralization::by_return_kind(suppress_original),
        ),
        HookGroup::new(
            IQIYI_UPGRADE,
            ScanPredicate::using_strings(["smartUpgradeResponse"]),
            MethodFilter::any(),
            Neutralization::fixed(OverrideValue::Null, suppress_original),
        ),
        HookGroup::new(
            FIREBASE_INIT,
            ScanPredicate::using_strings(["Device unlocked: initializing all Firebase APIs for app "]),
            MethodFilter::any(),
            Neutralization::fixed(OverrideValue::Null, suppress_original),
        ),
        HookGroup::new(
            FLAGS_INIT,
            ScanPredicate::using_strings(["Flags.initialize() was not called!"]),
            MethodFilter::any(),
            Neutralization::fixed(OverrideValue::Bool(true), suppress_original),
        ),
        HookGroup::new(
            AD_PACKAGES,
            ScanPredicate::InPackages {
                packages: AD_SDK_PACKAGES.iter().map(|p| p.to_string()).collect(),
                modifiers: Modifiers::PUBLIC,
                return_kind: Some(ReturnKind::Void),
            },
            MethodFilter::any()
                .public_only()
                .concrete_only()
                .returning(ReturnKind::Void)
                .named(AD_ENTRY_POINTS.iter().copied()),
            Neutralization::Replace,
        ),
    ]
}

/// Built-in groups restricted to `enabled`; an empty list keeps all of them
pub fn select_groups(enabled: &[String], suppress_original: bool) -> Vec<HookGroup> {
    builtin_groups(suppress_original)
        .into_iter()
        .filter(|g| enabled.is_empty() || enabled.iter().any(|name| *name == g.name))
        .collect()
}

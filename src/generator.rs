// Synthetic data: plausible users and VMs drawn from weighted bands. All
// randomness comes from the generator's own RNG so a seeded `StdRng` gives
// reproducible datasets.

use std::ops::RangeInclusive;

use chrono::{DateTime, Duration, Local};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::models::{NewVm, User, VirtualMachine, VmStatus};

pub const OPERATING_SYSTEMS: [&str; 12] = [
    "Ubuntu 22.04 LTS",
    "Ubuntu 20.04 LTS",
    "CentOS 8",
    "Red Hat Enterprise Linux 8",
    "Windows Server 2022",
    "Windows Server 2019",
    "Debian 11",
    "SUSE Linux Enterprise Server 15",
    "AlmaLinux 8",
    "Rocky Linux 8",
    "Fedora 38",
    "openSUSE Leap 15.4",
];

pub const EMAIL_DOMAINS: [&str; 12] = [
    "gmail.com",
    "outlook.com",
    "yahoo.com",
    "hotmail.com",
    "company.com",
    "entreprise.fr",
    "corp.com",
    "business.org",
    "tech.io",
    "startup.com",
    "innovation.fr",
    "digital.net",
];

const VM_NAME_PREFIXES: [&str; 10] = [
    "web", "db", "app", "api", "cache", "monitor", "backup", "test", "dev", "prod",
];

const VM_NAME_WORDS: [&str; 24] = [
    "atlas", "boreal", "cobalt", "delta", "etoile", "falaise", "granit", "horizon", "iris",
    "jade", "lumiere", "mistral", "nuage", "orage", "prisme", "quartz", "riviere", "saphir",
    "tempete", "union", "vallee", "zephyr", "azur", "brume",
];

const FIRST_NAMES: [&str; 24] = [
    "Inès", "Léa", "Chloé", "Zoé", "Camille", "Manon", "Océane", "Hélène", "Agnès", "Gaëlle",
    "Noémie", "Josée", "Jean", "Théo", "Hugo", "Lucas", "Jérôme", "François", "Benoît", "Loïc",
    "Mathéo", "Clément", "Gaël", "Anaïs",
];

const LAST_NAMES: [&str; 24] = [
    "Bouvet", "Dupont", "Martin", "Lefèvre", "Bernard", "Moreau", "Lefebvre", "Girard", "Faure",
    "Rousseau", "Mercier", "Blanc", "Guérin", "Boyer", "Garnier", "Chevalier", "François",
    "Légaré", "Lemaître", "Bézier", "Le Goff", "de La Fontaine", "Dupré", "Noël",
];

/// Weighted integer bands: pick a band by weight, then a value inside it.
struct Bands {
    ranges: &'static [(u32, u32)],
    index: WeightedIndex<f64>,
}

impl Bands {
    fn new(ranges: &'static [(u32, u32)], weights: &[f64]) -> Self {
        Self {
            ranges,
            // Weights are compile-time constants, all positive.
            index: WeightedIndex::new(weights).unwrap_or_else(|_| unreachable!()),
        }
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> u32 {
        let (lo, hi) = self.ranges[self.index.sample(rng)];
        rng.gen_range(lo..=hi)
    }
}

const CPU_BANDS: [(u32, u32); 4] = [(1, 2), (4, 4), (8, 8), (16, 32)];
const CPU_WEIGHTS: [f64; 4] = [0.3, 0.4, 0.2, 0.1];
const RAM_BANDS: [(u32, u32); 4] = [(2, 4), (8, 8), (16, 16), (32, 128)];
const RAM_WEIGHTS: [f64; 4] = [0.2, 0.3, 0.3, 0.2];
const DISK_BANDS: [(u32, u32); 4] = [(20, 50), (100, 100), (200, 200), (500, 2000)];
const DISK_WEIGHTS: [f64; 4] = [0.1, 0.4, 0.3, 0.2];
const STATUS_WEIGHTS: [f64; 5] = [0.6, 0.25, 0.05, 0.05, 0.05];

/// Random instant between `days` days ago and now.
fn recent_datetime<R: Rng>(rng: &mut R, days: i64) -> DateTime<Local> {
    let span = days * 24 * 60 * 60;
    Local::now() - Duration::seconds(rng.gen_range(0..=span))
}

/// Generates VM records.
pub struct VmDataGenerator<R> {
    rng: R,
    cpu: Bands,
    ram: Bands,
    disk: Bands,
    status: WeightedIndex<f64>,
}

impl<R: Rng> VmDataGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            cpu: Bands::new(&CPU_BANDS, &CPU_WEIGHTS),
            ram: Bands::new(&RAM_BANDS, &RAM_WEIGHTS),
            disk: Bands::new(&DISK_BANDS, &DISK_WEIGHTS),
            status: WeightedIndex::new(STATUS_WEIGHTS).unwrap_or_else(|_| unreachable!()),
        }
    }

    /// `<prefix>-<Word>`, e.g. `db-Mistral`.
    pub fn generate_vm_name(&mut self) -> String {
        let prefix = VM_NAME_PREFIXES.choose(&mut self.rng).copied().unwrap_or("vm");
        let word = VM_NAME_WORDS.choose(&mut self.rng).copied().unwrap_or("node");
        format!("{prefix}-{}", capitalize(word))
    }

    pub fn generate_operating_system(&mut self) -> &'static str {
        OPERATING_SYSTEMS.choose(&mut self.rng).copied().unwrap_or(OPERATING_SYSTEMS[0])
    }

    pub fn generate_cpu_cores(&mut self) -> u32 {
        self.cpu.sample(&mut self.rng)
    }

    pub fn generate_ram_gb(&mut self) -> u32 {
        self.ram.sample(&mut self.rng)
    }

    pub fn generate_disk_gb(&mut self) -> u32 {
        self.disk.sample(&mut self.rng)
    }

    pub fn generate_status(&mut self) -> VmStatus {
        VmStatus::ALL[self.status.sample(&mut self.rng)]
    }

    /// Payload for creating a VM through the API.
    pub fn generate_new_vm(&mut self, user_id: i64) -> NewVm {
        NewVm {
            user_id,
            name: self.generate_vm_name(),
            operating_system: self.generate_operating_system().to_string(),
            cpu_cores: self.generate_cpu_cores(),
            ram_gb: self.generate_ram_gb(),
            disk_gb: self.generate_disk_gb(),
            status: self.generate_status(),
        }
    }

    /// A complete VM created within the last six months.
    pub fn generate_vm(&mut self, user_id: i64, vm_id: i64) -> VirtualMachine {
        let spec = self.generate_new_vm(user_id);
        let vm = VirtualMachine {
            id: vm_id,
            user_id,
            name: spec.name,
            operating_system: spec.operating_system,
            cpu_cores: spec.cpu_cores,
            ram_gb: spec.ram_gb,
            disk_gb: spec.disk_gb,
            status: spec.status,
            created_at: recent_datetime(&mut self.rng, 182),
        };
        debug!(vm_id, user_id, name = %vm.name, "generated VM");
        vm
    }
}

/// Generates user records.
pub struct UserDataGenerator<R> {
    rng: R,
}

impl<R: Rng> UserDataGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn generate_name(&mut self) -> String {
        let first = FIRST_NAMES.choose(&mut self.rng).copied().unwrap_or("Jean");
        let last = LAST_NAMES.choose(&mut self.rng).copied().unwrap_or("Dupont");
        format!("{first} {last}")
    }

    /// Email whose local part is the name folded to ASCII: accents stripped,
    /// spaces turned into dots, hyphens and apostrophes dropped.
    pub fn generate_email(&mut self, name: &str) -> String {
        let domain = EMAIL_DOMAINS.choose(&mut self.rng).copied().unwrap_or("corp.com");
        format!("{}@{domain}", email_local_part(name))
    }

    /// A complete user created within the last twelve months, with no VMs.
    pub fn generate_user(&mut self, user_id: i64) -> User {
        let name = self.generate_name();
        let email = self.generate_email(&name);
        let user = User {
            id: user_id,
            created_at: recent_datetime(&mut self.rng, 365),
            name,
            email,
            vms: Vec::new(),
        };
        debug!(user_id, name = %user.name, email = %user.email, "generated user");
        user
    }
}

/// Builds whole datasets out of the user and VM generators.
pub struct DataGenerator<R> {
    users: UserDataGenerator<R>,
    vms: VmDataGenerator<R>,
    rng: R,
}

impl<R: Rng + SeedableRng> DataGenerator<R> {
    /// The user and VM generators are reseeded from `rng`, so each part
    /// draws from its own stream and a seeded `rng` still reproduces.
    pub fn new(mut rng: R) -> Self {
        let users = UserDataGenerator::new(R::seed_from_u64(rng.gen()));
        let vms = VmDataGenerator::new(R::seed_from_u64(rng.gen()));
        Self { users, vms, rng }
    }
}

impl<R: Rng> DataGenerator<R> {
    /// Users `1..=count`, each owning between `vms_per_user` VMs. VM ids
    /// run sequentially across the whole dataset.
    pub fn generate_users_with_vms(
        &mut self,
        user_count: usize,
        vms_per_user: RangeInclusive<usize>,
    ) -> Vec<User> {
        info!(user_count, min_vms = vms_per_user.start(), max_vms = vms_per_user.end(), "generating dataset");
        let mut users = Vec::with_capacity(user_count);
        let mut next_vm_id = 1_i64;

        for user_id in 1..=user_count as i64 {
            let mut user = self.users.generate_user(user_id);
            let vm_count = if vms_per_user.is_empty() {
                0
            } else {
                self.rng.gen_range(vms_per_user.clone())
            };
            for _ in 0..vm_count {
                user.vms.push(self.vms.generate_vm(user_id, next_vm_id));
                next_vm_id += 1;
            }
            users.push(user);
        }

        let total_vms = next_vm_id - 1;
        info!(total_users = users.len(), total_vms, "dataset generated");
        users
    }

    /// `vm_count` VMs, each owned by a random id from `user_ids`.
    pub fn generate_vms_only(&mut self, vm_count: usize, user_ids: &[i64]) -> Vec<VirtualMachine> {
        info!(vm_count, available_users = user_ids.len(), "generating VMs");
        if user_ids.is_empty() {
            return Vec::new();
        }
        (1..=vm_count as i64)
            .map(|vm_id| {
                let user_id = user_ids.choose(&mut self.rng).copied().unwrap_or(user_ids[0]);
                self.vms.generate_vm(user_id, vm_id)
            })
            .collect()
    }

    pub fn users(&mut self) -> &mut UserDataGenerator<R> {
        &mut self.users
    }

    pub fn vms(&mut self) -> &mut VmDataGenerator<R> {
        &mut self.vms
    }
}

/// ASCII local part for an email built from a display name.
pub fn email_local_part(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        match c {
            ' ' => out.push('.'),
            '-' | '\'' | '\u{2019}' => {}
            c if c.is_ascii_alphanumeric() || c == '.' => out.push(c),
            c => {
                if let Some(folded) = fold_diacritic(c) {
                    out.push_str(folded);
                }
            }
        }
    }
    out
}

/// ASCII replacement for common Latin letters with diacritics.
fn fold_diacritic(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ß' => "ss",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ţ' | 'ť' | 'ŧ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn email_strips_accents_and_spaces() {
        let mut generator = UserDataGenerator::new(rng());
        let email = generator.generate_email("Inès Bouvet");
        let (local, domain) = email.split_once('@').unwrap();
        assert_eq!(local, "ines.bouvet");
        assert!(EMAIL_DOMAINS.contains(&domain));
    }

    #[test]
    fn email_local_part_is_ascii() {
        assert_eq!(email_local_part("Jean-François Lemaître"), "jeanfrancois.lemaitre");
        assert_eq!(email_local_part("Gaëlle d'Œuvre"), "gaelle.doeuvre");
        assert_eq!(email_local_part("Anaïs de La Fontaine"), "anais.de.la.fontaine");
        for first in FIRST_NAMES {
            for last in LAST_NAMES {
                let local = email_local_part(&format!("{first} {last}"));
                assert!(local.is_ascii(), "{local}");
                assert!(local.chars().all(|c| c.is_ascii_alphanumeric() || c == '.'));
            }
        }
    }

    #[test]
    fn vm_values_stay_inside_their_bands() {
        let mut generator = VmDataGenerator::new(rng());
        for _ in 0..500 {
            let cpu = generator.generate_cpu_cores();
            assert!((1..=2).contains(&cpu) || cpu == 4 || cpu == 8 || (16..=32).contains(&cpu));
            let ram = generator.generate_ram_gb();
            assert!((2..=4).contains(&ram) || ram == 8 || ram == 16 || (32..=128).contains(&ram));
            let disk = generator.generate_disk_gb();
            assert!(
                (20..=50).contains(&disk) || disk == 100 || disk == 200 || (500..=2000).contains(&disk)
            );
        }
    }

    #[test]
    fn status_is_skewed_toward_running() {
        let mut generator = VmDataGenerator::new(rng());
        let running = (0..2000)
            .filter(|_| generator.generate_status() == VmStatus::Running)
            .count();
        // Expected 1200; generous bounds.
        assert!((1000..1400).contains(&running), "running = {running}");
    }

    #[test]
    fn vm_name_has_prefix_and_capitalized_word() {
        let mut generator = VmDataGenerator::new(rng());
        let name = generator.generate_vm_name();
        let (prefix, word) = name.split_once('-').unwrap();
        assert!(VM_NAME_PREFIXES.contains(&prefix));
        assert!(word.chars().next().unwrap().is_uppercase());
    }

    #[test]
    fn generated_dates_are_in_the_past() {
        let mut generator = VmDataGenerator::new(rng());
        let vm = generator.generate_vm(1, 1);
        let now = Local::now();
        assert!(vm.created_at <= now);
        assert!(vm.created_at >= now - Duration::days(183));
    }

    #[test]
    fn dataset_ids_are_sequential() {
        let mut generator = DataGenerator::new(rng());
        let users = generator.generate_users_with_vms(20, 0..=5);
        assert_eq!(users.len(), 20);
        assert!(users.iter().enumerate().all(|(i, u)| u.id == i as i64 + 1));

        let vm_ids: Vec<i64> = users.iter().flat_map(|u| u.vms.iter().map(|v| v.id)).collect();
        let expected: Vec<i64> = (1..=vm_ids.len() as i64).collect();
        assert_eq!(vm_ids, expected);
        for user in &users {
            assert!(user.vms.len() <= 5);
            assert!(user.vms.iter().all(|vm| vm.user_id == user.id));
        }
    }

    #[test]
    fn vms_only_uses_given_owners() {
        let mut generator = DataGenerator::new(rng());
        let vms = generator.generate_vms_only(30, &[4, 8, 15]);
        assert_eq!(vms.len(), 30);
        assert!(vms.iter().all(|vm| [4, 8, 15].contains(&vm.user_id)));
        assert!(generator.generate_vms_only(5, &[]).is_empty());
    }

    fn draws(rng: &mut StdRng) -> Vec<u32> {
        (0..32).map(|_| rng.gen()).collect()
    }

    #[test]
    fn dataset_parts_use_unrelated_streams() {
        let mut generator = DataGenerator::new(rng());
        let streams = [
            draws(&mut generator.users.rng),
            draws(&mut generator.vms.rng),
            draws(&mut generator.rng),
        ];
        for (i, a) in streams.iter().enumerate() {
            for (j, b) in streams.iter().enumerate() {
                if i != j {
                    assert!(
                        !b.windows(4).any(|w| w == &a[..4]),
                        "stream {i} reappears inside stream {j}"
                    );
                }
            }
        }
    }

    #[test]
    fn same_seed_gives_same_dataset() {
        let a = DataGenerator::new(rng()).generate_users_with_vms(5, 1..=3);
        let b = DataGenerator::new(rng()).generate_users_with_vms(5, 1..=3);
        let names = |users: &[User]| users.iter().map(|u| (u.name.clone(), u.vms.len())).collect::<Vec<_>>();
        assert_eq!(names(&a), names(&b));
    }
}

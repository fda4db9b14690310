use anyhow::{Context, Result};

use survey_panel::data::regions::Region;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}

const HEADER: [&str; 17] = [
    "PERG.5", "PERG.6", "PERG.7", "PERG.9", "PERG.13", "PERG.14", "PERG.16", "PERG.17",
    "PERG.19", "PERG.21", "PERG.26", "PERG.38", "PERG.39", "PERG.42", "PERG.44", "PERG.61",
    "PERG.63",
];

const ETHNICITIES: &[&str] = &["Branco", "Branco", "Pardo", "Preto", "Africano", "Amarelo", "Indiferente  ", "99"];
const PROFESSIONS: &[&str] = &[
    "Não tem outra profissão",
    "Não tem outra profissão",
    "Administrador(a)",
    "Advogado(a)",
    "Empresário(a)",
    "Aposentado",
    "Motorista",
];
const EDUCATION: &[&str] = &["Médio", "Superior incompleto", "Superior completo", "Pós-graduação"];
const DEGREES: &[&str] = &[
    "Administração de Empresas",
    "adm.",
    "Direito",
    "Engenharia Civil",
    "Ciencias Contabeis",
    "Pedagogia",
    "Nao",
    "Biologia",
];
const POSTGRAD: &[&str] = &["Direito Imobiliário", "MBA em Gestão", "Marketing Digital", "Psicologia", "Adm"];
const MASTERS: &[&str] = &["Não", "N", "MBA", "Administração", "Letras"];
const LANGUAGES: &[&str] = &["Inglês", "Inglês", "Espanhol", "Espanhol", "Francês", "Italiano", "Alemão"];
const YES_NO: &[&str] = &["Sim", "Não"];
const PORTALS: &[&str] = &["OLX", "ZAP", "Viva Real", "Casa Mineira", "Instagram", "Facebook"];

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let states: Vec<&str> = Region::ALL
        .iter()
        .flat_map(|r| r.fixed_states().iter().copied())
        .collect();

    let output_path = "sample_survey.csv";
    let mut writer = csv::Writer::from_path(output_path).context("creating output file")?;
    writer.write_record(HEADER).context("writing header")?;

    let n_rows = 500;
    for _ in 0..n_rows {
        let age = rng.gauss(44.0, 12.0).clamp(18.0, 85.0) as i64;
        let age = if rng.chance(0.05) {
            format!("{age} anos")
        } else if rng.chance(0.02) {
            "não informou".to_string()
        } else {
            age.to_string()
        };

        let sales = if rng.chance(0.1) {
            String::new()
        } else {
            (rng.gauss(8.0, 6.0).max(0.0) as i64).to_string()
        };

        let portals = |rng: &mut SimpleRng| -> String {
            if rng.chance(0.1) {
                return "Não faz anúncios".to_string();
            }
            let picked: Vec<&str> = PORTALS.iter().copied().filter(|_| rng.chance(0.35)).collect();
            picked.join(", ")
        };
        let favourite = portals(&mut rng);
        let all_portals = portals(&mut rng);

        let record = [
            age,
            rng.pick(&states).to_string(),
            rng.pick(&["Capital", "Interior", "Interior"]).to_string(),
            rng.pick(&["Masculino", "Feminino"]).to_string(),
            rng.pick(ETHNICITIES).to_string(),
            rng.pick(PROFESSIONS).to_string(),
            if rng.chance(0.03) { String::new() } else { rng.pick(EDUCATION).to_string() },
            rng.pick(DEGREES).to_string(),
            rng.pick(POSTGRAD).to_string(),
            rng.pick(MASTERS).to_string(),
            rng.pick(LANGUAGES).to_string(),
            rng.pick(YES_NO).to_string(),
            rng.pick(YES_NO).to_string(),
            rng.pick(YES_NO).to_string(),
            sales,
            all_portals,
            favourite,
        ];
        writer.write_record(&record).context("writing row")?;
    }
    writer.flush().context("flushing output")?;

    println!("Wrote {n_rows} survey responses to {output_path}");
    Ok(())
}
